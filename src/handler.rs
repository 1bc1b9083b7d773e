use std::sync::Arc;

use axum::{Json, response::IntoResponse};
use tracing::info;

use crate::api::StatusResponse;
use crate::auth::{IdentityProvider, SessionSettings};
use crate::db::Database;
use crate::realtime::ChangeFeed;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub feed: ChangeFeed,
    pub provider: Arc<dyn IdentityProvider>,
    pub sessions: SessionSettings,
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(StatusResponse::new_from_msg("ok"))
}
