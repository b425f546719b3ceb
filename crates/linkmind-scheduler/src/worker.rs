//! Dispatch Worker — claims due tasks and pushes reminders.
//!
//! Stateless per pass: every invocation reclaims expired claims, claims a
//! batch of due tasks, re-checks each bookmark (it may have been read or
//! deleted since the claim), sends, and records the outcome. A crash mid
//! pass loses nothing — the claim timeout returns the task to Scheduled.

use std::sync::Arc;

use serde::Serialize;

use linkmind_core::{
    BookmarkRepo, Clock, LinkMindError, NotificationSender, PushMessage, Result,
    config::SchedulerConfig,
};
use linkmind_store::{BackoffPolicy, ReminderTask, TaskState, TaskStore};

/// Outcome tally for one worker pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchStats {
    pub claimed: usize,
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl DispatchStats {
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }
}

enum Resolution {
    Delivered,
    Retried,
    Failed,
    Cancelled,
    /// Another path (reschedule, cancel, reclaim) resolved the task while
    /// our send was in flight. Nothing to do.
    Superseded,
}

pub struct DispatchWorker {
    store: Arc<TaskStore>,
    bookmarks: Arc<dyn BookmarkRepo>,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
    backoff: BackoffPolicy,
    batch_size: usize,
    claim_timeout: chrono::Duration,
}

impl DispatchWorker {
    pub fn new(
        store: Arc<TaskStore>,
        bookmarks: Arc<dyn BookmarkRepo>,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            bookmarks,
            sender,
            clock,
            backoff: BackoffPolicy {
                base: chrono::Duration::seconds(config.backoff_base_secs as i64),
                cap: chrono::Duration::seconds(config.backoff_cap_secs as i64),
                max_attempts: config.max_attempts,
            },
            batch_size: config.dispatch_batch_size,
            claim_timeout: chrono::Duration::seconds(config.claim_timeout_secs as i64),
        }
    }

    /// One full dispatch pass. Errors on individual tasks are logged and
    /// tallied, never aborting the rest of the batch.
    pub async fn run_once(&self) -> Result<DispatchStats> {
        let now = self.clock.now();
        self.store.reclaim_expired(now, self.claim_timeout)?;

        let tasks = self.store.claim_due(now, self.batch_size)?;
        let mut stats = DispatchStats {
            claimed: tasks.len(),
            ..Default::default()
        };

        for task in &tasks {
            match self.dispatch_one(task).await {
                Ok(Resolution::Delivered) => stats.delivered += 1,
                Ok(Resolution::Retried) => stats.retried += 1,
                Ok(Resolution::Failed) => stats.failed += 1,
                Ok(Resolution::Cancelled) => stats.cancelled += 1,
                Ok(Resolution::Superseded) => {}
                Err(e) => {
                    // The claim will expire and the task gets another pass.
                    tracing::warn!("⚠️ Dispatch error for bookmark {}: {e}", task.bookmark_id);
                }
            }
        }

        Ok(stats)
    }

    async fn dispatch_one(&self, task: &ReminderTask) -> Result<Resolution> {
        let Some(token) = task.claim_token.as_deref() else {
            return Ok(Resolution::Superseded);
        };

        // The bookmark may have been read or deleted after the claim.
        let bookmark = match self.bookmarks.get(&task.bookmark_id).await? {
            None => {
                tracing::debug!("Bookmark {} gone, cancelling reminder", task.bookmark_id);
                self.store.cancel(&task.bookmark_id, self.clock.now())?;
                return Ok(Resolution::Cancelled);
            }
            Some(b) if b.is_read => {
                tracing::debug!("Bookmark {} already read, cancelling reminder", task.bookmark_id);
                self.store.cancel(&task.bookmark_id, self.clock.now())?;
                return Ok(Resolution::Cancelled);
            }
            Some(b) => b,
        };

        let message = PushMessage::reminder(&bookmark);
        let outcome = self.sender.send(&bookmark.user_id, &message).await;

        match self
            .store
            .complete(&task.id, token, &outcome, self.clock.now(), &self.backoff)
        {
            Ok(TaskState::Delivered) => {
                tracing::info!("✅ Reminder delivered for bookmark {}", task.bookmark_id);
                Ok(Resolution::Delivered)
            }
            Ok(TaskState::Scheduled) => {
                tracing::warn!(
                    "🔁 Send failed for bookmark {} (attempt {}), retrying with backoff",
                    task.bookmark_id,
                    task.attempt + 1
                );
                Ok(Resolution::Retried)
            }
            Ok(TaskState::Failed) => {
                tracing::warn!("❌ Reminder failed permanently for bookmark {}", task.bookmark_id);
                Ok(Resolution::Failed)
            }
            Ok(_) => Ok(Resolution::Superseded),
            // Race lost: the task was rescheduled/cancelled mid-send.
            Err(LinkMindError::StaleClaim) => {
                tracing::debug!("Claim superseded for bookmark {}", task.bookmark_id);
                Ok(Resolution::Superseded)
            }
            Err(e) => Err(e),
        }
    }
}

/// Spawn the dispatch loop as a background tokio task.
pub fn spawn_dispatch_loop(worker: Arc<DispatchWorker>, interval_secs: u64) {
    tokio::spawn(async move {
        tracing::info!("⏰ Dispatch worker started (every {interval_secs}s)");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match worker.run_once().await {
                Ok(stats) if !stats.is_empty() => {
                    tracing::info!(
                        "📣 Dispatch pass: {} claimed, {} delivered, {} retried, {} failed, {} cancelled",
                        stats.claimed, stats.delivered, stats.retried, stats.failed, stats.cancelled
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️ Dispatch pass failed: {e}"),
            }
        }
    });
}
