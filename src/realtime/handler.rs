use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{Stream, StreamExt};

use super::FeedItem;
use crate::auth::CurrentUser;
use crate::handler::AppState;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

pub async fn stream_changes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state.feed.subscribe(&user.id).map(|item| Ok(to_event(item)));
    tracing::info!(
        user_id = %user.id,
        subscribers = state.feed.subscriber_count(),
        "change feed subscribed"
    );

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE))
}

fn to_event(item: FeedItem) -> Event {
    match item {
        FeedItem::Change(change) => match Event::default().event("change").json_data(&change) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode change, asking client to resync");
                resync_event(0)
            }
        },
        FeedItem::Resync { skipped } => {
            tracing::warn!(skipped, "change feed subscriber lagged");
            resync_event(skipped)
        }
    }
}

fn resync_event(skipped: u64) -> Event {
    Event::default().event("resync").data(skipped.to_string())
}
