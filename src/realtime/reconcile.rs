use crate::bookmarks::Bookmark;

use super::{Change, ChangeKind};

/// A local, newest-first copy of one user's bookmarks kept current by applying
/// feed changes in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveBookmarks {
    items: Vec<Bookmark>,
}

impl LiveBookmarks {
    pub fn new(items: Vec<Bookmark>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Bookmark] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces the whole list, after an initial fetch or a resync.
    pub fn reset(&mut self, items: Vec<Bookmark>) {
        self.items = items;
    }

    /// Drops an entry right away after a local delete succeeded. The DELETE
    /// event that follows is then a no-op.
    pub fn remove(&mut self, id: &str) {
        self.items.retain(|b| b.id != id);
    }

    pub fn apply(&mut self, change: Change) {
        match change.event_type {
            ChangeKind::Insert => {
                let Some(new) = change.new else { return };
                match self.items.iter_mut().find(|b| b.id == new.id) {
                    Some(existing) => *existing = new,
                    None => self.items.insert(0, new),
                }
            }
            ChangeKind::Delete => {
                if let Some(old) = change.old {
                    self.remove(&old.id);
                }
            }
            ChangeKind::Update => {
                let Some(new) = change.new else { return };
                if let Some(existing) = self.items.iter_mut().find(|b| b.id == new.id) {
                    *existing = new;
                }
            }
        }
    }
}
