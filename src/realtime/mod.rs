//! Realtime Module
//!
//! An in-process change feed for the bookmarks table. Writers publish one
//! [`Change`] per committed insert, update or delete; subscribers receive only
//! the changes of the user they subscribed for, in publish order.
//!
//! The HTTP side streams the feed as Server-Sent Events, and
//! [`LiveBookmarks`] applies the same events to a local list on the consuming
//! side (the web page mirrors it in JavaScript).

mod handler;
mod reconcile;

pub use handler::stream_changes;
pub use reconcile::LiveBookmarks;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

use crate::bookmarks::Bookmark;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// The key of a row that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkKey {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub event_type: ChangeKind,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Bookmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<BookmarkKey>,
}

impl Change {
    pub fn inserted(bookmark: Bookmark) -> Self {
        Change {
            event_type: ChangeKind::Insert,
            user_id: bookmark.user_id.clone(),
            new: Some(bookmark),
            old: None,
        }
    }

    pub fn updated(bookmark: Bookmark) -> Self {
        Change {
            event_type: ChangeKind::Update,
            user_id: bookmark.user_id.clone(),
            old: Some(BookmarkKey {
                id: bookmark.id.clone(),
            }),
            new: Some(bookmark),
        }
    }

    pub fn deleted(user_id: &str, id: &str) -> Self {
        Change {
            event_type: ChangeKind::Delete,
            user_id: user_id.to_string(),
            new: None,
            old: Some(BookmarkKey { id: id.to_string() }),
        }
    }
}

/// What a subscriber sees: a change, or notice that it fell behind and must
/// refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    Change(Change),
    Resync { skipped: u64 },
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a change. Having no subscribers is not an error.
    pub fn publish(&self, change: Change) {
        let receivers = self.tx.send(change).unwrap_or(0);
        tracing::debug!(receivers, "published bookmark change");
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Changes for `user_id` only, starting from the moment of subscription.
    pub fn subscribe(&self, user_id: &str) -> impl Stream<Item = FeedItem> + Send + use<> {
        let user_id = user_id.to_string();
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| match item {
            Ok(change) if change.user_id == user_id => Some(FeedItem::Change(change)),
            Ok(_) => None,
            Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
                Some(FeedItem::Resync { skipped })
            }
        })
    }
}
