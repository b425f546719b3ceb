//! Reconciliation Sweeper — the safety net behind the gateway.
//!
//! Finds unread bookmarks whose due time has passed with no live task
//! (a task write that failed silently, a restart mid-write) and re-enters
//! them through the same upsert path, due immediately. Also ends the
//! audit window for terminal tasks. Cheap to run repeatedly: a pass over
//! consistent state changes nothing.

use std::sync::Arc;

use serde::Serialize;

use linkmind_core::{BookmarkRepo, Clock, Result};
use linkmind_store::TaskStore;

/// Outcome tally for one sweep pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepStats {
    /// Overdue unread bookmarks that had no live task and got one.
    pub repaired: usize,
    /// Terminal tasks dropped at the end of the audit window.
    pub purged: usize,
}

pub struct ReconciliationSweeper {
    store: Arc<TaskStore>,
    bookmarks: Arc<dyn BookmarkRepo>,
    clock: Arc<dyn Clock>,
    audit_retention: chrono::Duration,
}

impl ReconciliationSweeper {
    pub fn new(
        store: Arc<TaskStore>,
        bookmarks: Arc<dyn BookmarkRepo>,
        clock: Arc<dyn Clock>,
        audit_retention: chrono::Duration,
    ) -> Self {
        Self {
            store,
            bookmarks,
            clock,
            audit_retention,
        }
    }

    pub async fn run_once(&self) -> Result<SweepStats> {
        let now = self.clock.now();
        let mut stats = SweepStats::default();

        for bookmark in self.bookmarks.unread_overdue(now).await? {
            if self.store.live_task(&bookmark.id)?.is_some() {
                continue;
            }
            // Lost reminder: schedule it due right now.
            self.store.upsert(&bookmark.id, &bookmark.user_id, now, now)?;
            tracing::warn!(
                "🧹 Sweeper repaired missing reminder for bookmark {}",
                bookmark.id
            );
            stats.repaired += 1;
        }

        stats.purged = self.store.purge_terminal(now - self.audit_retention)?;
        Ok(stats)
    }
}

/// Spawn the sweep loop as a background tokio task.
pub fn spawn_sweep_loop(sweeper: Arc<ReconciliationSweeper>, interval_secs: u64) {
    tokio::spawn(async move {
        tracing::info!("🧹 Reconciliation sweeper started (every {interval_secs}s)");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match sweeper.run_once().await {
                Ok(stats) if stats.repaired > 0 || stats.purged > 0 => {
                    tracing::info!(
                        "🧹 Sweep pass: {} repaired, {} purged",
                        stats.repaired,
                        stats.purged
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️ Sweep pass failed: {e}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use linkmind_core::{Bookmark, ManualClock, MemoryBookmarkRepo, ReminderInterval};
    use linkmind_store::TaskState;

    struct Fixture {
        store: Arc<TaskStore>,
        repo: Arc<MemoryBookmarkRepo>,
        clock: Arc<ManualClock>,
        sweeper: ReconciliationSweeper,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(TaskStore::open_in_memory().unwrap());
        let repo = Arc::new(MemoryBookmarkRepo::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sweeper = ReconciliationSweeper::new(
            store.clone(),
            repo.clone(),
            clock.clone(),
            Duration::days(7),
        );
        Fixture {
            store,
            repo,
            clock,
            sweeper,
        }
    }

    fn bookmark(id: &str, is_read: bool, due: chrono::DateTime<Utc>) -> Bookmark {
        Bookmark {
            id: id.into(),
            user_id: "u1".into(),
            url: "https://example.com".into(),
            title: None,
            reminder_interval: ReminderInterval::OneDay,
            next_reminder_at: due,
            is_read,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn repairs_overdue_bookmark_with_no_task() {
        let f = fixture();
        let overdue = f.clock.now() - Duration::hours(1);
        f.repo.insert(bookmark("lost", false, overdue));

        let stats = f.sweeper.run_once().await.unwrap();
        assert_eq!(stats.repaired, 1);

        // New task is due immediately
        let task = f.store.live_task("lost").unwrap().unwrap();
        assert_eq!(task.state, TaskState::Scheduled);
        assert_eq!(task.due_at, f.clock.now());

        // Re-running over now-consistent state is a no-op
        let stats = f.sweeper.run_once().await.unwrap();
        assert_eq!(stats.repaired, 0);
    }

    #[tokio::test]
    async fn leaves_live_tasks_and_future_bookmarks_alone() {
        let f = fixture();
        let now = f.clock.now();

        // Overdue but already has a live task
        f.repo.insert(bookmark("tracked", false, now - Duration::hours(1)));
        f.store
            .upsert("tracked", "u1", now - Duration::hours(1), now)
            .unwrap();
        let existing = f.store.live_task("tracked").unwrap().unwrap();

        // Not yet due, and read: neither is the sweeper's business
        f.repo.insert(bookmark("future", false, now + Duration::days(1)));
        f.repo.insert(bookmark("read", true, now - Duration::days(1)));

        let stats = f.sweeper.run_once().await.unwrap();
        assert_eq!(stats.repaired, 0);
        // Existing task untouched
        assert_eq!(f.store.live_task("tracked").unwrap().unwrap().id, existing.id);
        assert!(f.store.live_task("future").unwrap().is_none());
        assert!(f.store.live_task("read").unwrap().is_none());
    }

    #[tokio::test]
    async fn purges_terminal_tasks_after_audit_window() {
        let f = fixture();
        let now = f.clock.now();

        f.store.upsert("done", "u1", now, now).unwrap();
        f.store.cancel("done", now).unwrap();

        // Within the window: kept
        let stats = f.sweeper.run_once().await.unwrap();
        assert_eq!(stats.purged, 0);

        f.clock.advance(Duration::days(8));
        let stats = f.sweeper.run_once().await.unwrap();
        assert_eq!(stats.purged, 1);
        assert!(f.store.status("done").unwrap().is_none());
    }
}
