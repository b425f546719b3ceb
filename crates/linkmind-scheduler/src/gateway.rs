//! Scheduling Gateway — the entry point the bookmark CRUD layer calls.
//!
//! Translates bookmark lifecycle events into task store operations. Every
//! call is synchronous from the caller's perspective: a store failure
//! propagates back so the bookmark write is not reported as
//! reminder-scheduled, and the sweeper remains the backstop.

use std::sync::Arc;

use linkmind_core::{Bookmark, Clock, ReminderInterval, Result, policy};
use linkmind_store::TaskStore;

pub struct SchedulingGateway {
    store: Arc<TaskStore>,
    clock: Arc<dyn Clock>,
}

impl SchedulingGateway {
    pub fn new(store: Arc<TaskStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// A bookmark was saved. Unread bookmarks get a task due at their
    /// precomputed `next_reminder_at`; read ones get nothing.
    pub fn on_bookmark_created(&self, bookmark: &Bookmark) -> Result<()> {
        if bookmark.is_read {
            return Ok(());
        }
        let now = self.clock.now();
        self.store
            .upsert(&bookmark.id, &bookmark.user_id, bookmark.next_reminder_at, now)?;
        tracing::info!(
            "📌 Reminder scheduled for bookmark {} at {}",
            bookmark.id,
            bookmark.next_reminder_at
        );
        Ok(())
    }

    /// Marked read — the pending reminder is cancelled.
    pub fn on_bookmark_marked_read(&self, bookmark_id: &str) -> Result<()> {
        self.store.cancel(bookmark_id, self.clock.now())?;
        Ok(())
    }

    /// Marked unread again — recompute the due time and replace any task.
    /// Returns the new due time so the CRUD layer can persist it.
    pub fn on_bookmark_marked_unread(
        &self,
        bookmark_id: &str,
        user_id: &str,
        interval: ReminderInterval,
    ) -> Result<chrono::DateTime<chrono::Utc>> {
        let now = self.clock.now();
        let due = policy::next_due(now, interval);
        self.store.upsert(bookmark_id, user_id, due, now)?;
        tracing::info!("🔁 Reminder rescheduled for bookmark {bookmark_id} at {due}");
        Ok(due)
    }

    /// Interval changed — same as re-unread: recompute and replace.
    pub fn on_interval_changed(
        &self,
        bookmark_id: &str,
        user_id: &str,
        interval: ReminderInterval,
    ) -> Result<chrono::DateTime<chrono::Utc>> {
        self.on_bookmark_marked_unread(bookmark_id, user_id, interval)
    }

    /// Deleted — cancel whatever is pending. Idempotent.
    pub fn on_bookmark_deleted(&self, bookmark_id: &str) -> Result<()> {
        self.store.cancel(bookmark_id, self.clock.now())?;
        Ok(())
    }
}
