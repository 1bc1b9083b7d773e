use std::error::Error;

use axum::{
    Router,
    http::Method,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod assets;
pub mod auth;
pub mod bookmarks;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod realtime;

use crate::handler::{AppState, healthcheck};

/// Builds the full application router: API, auth flow, change feed and the
/// embedded web page as fallback.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthcheck))
        .nest("/auth", auth::routes())
        .nest("/bookmarks", bookmarks::routes())
        .fallback(assets::serve_embedded)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn unpack_error(err: &dyn Error) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
