//! In-memory bookmark repo — the test double standing in for the CRUD
//! collaborator in scheduler tests and the demo wiring.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Bookmark, ReminderInterval};
use crate::traits::BookmarkRepo;

/// HashMap-backed `BookmarkRepo` with the mutation helpers the real CRUD
/// layer would perform on its own store.
#[derive(Default)]
pub struct MemoryBookmarkRepo {
    bookmarks: Mutex<HashMap<String, Bookmark>>,
}

impl MemoryBookmarkRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bookmark: Bookmark) {
        self.bookmarks
            .lock()
            .unwrap()
            .insert(bookmark.id.clone(), bookmark);
    }

    pub fn mark_read(&self, bookmark_id: &str) {
        if let Some(b) = self.bookmarks.lock().unwrap().get_mut(bookmark_id) {
            b.is_read = true;
        }
    }

    pub fn mark_unread(&self, bookmark_id: &str, next_reminder_at: DateTime<Utc>) {
        if let Some(b) = self.bookmarks.lock().unwrap().get_mut(bookmark_id) {
            b.is_read = false;
            b.next_reminder_at = next_reminder_at;
        }
    }

    pub fn set_interval(
        &self,
        bookmark_id: &str,
        interval: ReminderInterval,
        next_reminder_at: DateTime<Utc>,
    ) {
        if let Some(b) = self.bookmarks.lock().unwrap().get_mut(bookmark_id) {
            b.reminder_interval = interval;
            b.next_reminder_at = next_reminder_at;
        }
    }

    pub fn remove(&self, bookmark_id: &str) {
        self.bookmarks.lock().unwrap().remove(bookmark_id);
    }

    pub fn len(&self) -> usize {
        self.bookmarks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BookmarkRepo for MemoryBookmarkRepo {
    async fn get(&self, bookmark_id: &str) -> Result<Option<Bookmark>> {
        Ok(self.bookmarks.lock().unwrap().get(bookmark_id).cloned())
    }

    async fn unread_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Bookmark>> {
        Ok(self
            .bookmarks
            .lock()
            .unwrap()
            .values()
            .filter(|b| !b.is_read && b.next_reminder_at <= now)
            .cloned()
            .collect())
    }

    async fn unread_by_user(&self) -> Result<HashMap<String, Vec<Bookmark>>> {
        let mut by_user: HashMap<String, Vec<Bookmark>> = HashMap::new();
        for b in self.bookmarks.lock().unwrap().values() {
            if !b.is_read {
                by_user.entry(b.user_id.clone()).or_default().push(b.clone());
            }
        }
        Ok(by_user)
    }
}
