//! Digest Aggregator — one daily summary push per user with unread
//! bookmarks. Read-only over bookmark data, stateless per run, and never
//! touches reminder task state. One user's failed send must not block
//! the rest (collect and continue).

use std::sync::Arc;

use serde::Serialize;

use linkmind_core::{BookmarkRepo, Clock, NotificationSender, PushMessage, Result, SendOutcome};

/// Outcome tally for one digest pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DigestStats {
    pub users: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct DigestAggregator {
    bookmarks: Arc<dyn BookmarkRepo>,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
}

impl DigestAggregator {
    pub fn new(
        bookmarks: Arc<dyn BookmarkRepo>,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookmarks,
            sender,
            clock,
        }
    }

    pub async fn run_once(&self) -> Result<DigestStats> {
        let started = self.clock.now();
        let by_user = self.bookmarks.unread_by_user().await?;

        let mut stats = DigestStats {
            users: by_user.len(),
            ..Default::default()
        };

        for (user_id, unread) in &by_user {
            if unread.is_empty() {
                continue;
            }
            let message = PushMessage::digest(unread);
            match self.sender.send(user_id, &message).await {
                SendOutcome::Delivered => stats.sent += 1,
                SendOutcome::Retryable(reason) | SendOutcome::Terminal(reason) => {
                    // No retry machinery here — the next daily run covers it.
                    tracing::warn!("⚠️ Digest send failed for user {user_id}: {reason}");
                    stats.failed += 1;
                }
            }
        }

        tracing::debug!(
            "📰 Digest pass finished in {}ms: {} users, {} sent, {} failed",
            (self.clock.now() - started).num_milliseconds(),
            stats.users,
            stats.sent,
            stats.failed
        );
        Ok(stats)
    }
}

/// Spawn the digest loop as a background tokio task.
pub fn spawn_digest_loop(digest: Arc<DigestAggregator>, interval_secs: u64) {
    tokio::spawn(async move {
        tracing::info!("📰 Digest aggregator started (every {interval_secs}s)");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        // The first tick fires immediately; skip it so a restart doesn't
        // double-send the day's digest.
        interval.tick().await;
        loop {
            interval.tick().await;
            match digest.run_once().await {
                Ok(stats) if stats.users > 0 => {
                    tracing::info!(
                        "📰 Digest pass: {} users, {} sent, {} failed",
                        stats.users,
                        stats.sent,
                        stats.failed
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️ Digest pass failed: {e}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use linkmind_core::{Bookmark, ManualClock, MemoryBookmarkRepo, ReminderInterval};

    /// Sender that fails for configured users and records the rest.
    #[derive(Default)]
    struct SelectiveSender {
        fail_users: Vec<String>,
        sent: Mutex<HashMap<String, PushMessage>>,
    }

    #[async_trait]
    impl NotificationSender for SelectiveSender {
        async fn send(&self, user_id: &str, message: &PushMessage) -> SendOutcome {
            if self.fail_users.iter().any(|u| u == user_id) {
                return SendOutcome::Retryable("device offline".into());
            }
            self.sent
                .lock()
                .unwrap()
                .insert(user_id.to_string(), message.clone());
            SendOutcome::Delivered
        }
    }

    fn bookmark(id: &str, user: &str, is_read: bool) -> Bookmark {
        Bookmark {
            id: id.into(),
            user_id: user.into(),
            url: format!("https://example.com/{id}"),
            title: Some(format!("Article {id}")),
            reminder_interval: ReminderInterval::OneDay,
            next_reminder_at: Utc::now(),
            is_read,
            created_at: Utc::now(),
        }
    }

    fn aggregator(repo: Arc<MemoryBookmarkRepo>, sender: Arc<SelectiveSender>) -> DigestAggregator {
        DigestAggregator::new(repo, sender, Arc::new(ManualClock::new(Utc::now())))
    }

    #[tokio::test]
    async fn one_digest_per_user_with_unread() {
        let repo = Arc::new(MemoryBookmarkRepo::new());
        repo.insert(bookmark("a", "u1", false));
        repo.insert(bookmark("b", "u1", false));
        repo.insert(bookmark("c", "u2", false));
        repo.insert(bookmark("d", "u3", true)); // all read — no digest

        let sender = Arc::new(SelectiveSender::default());
        let stats = aggregator(repo, sender.clone()).run_once().await.unwrap();

        assert_eq!(stats.users, 2);
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.failed, 0);

        let sent = sender.sent.lock().unwrap();
        assert!(sent["u1"].body.starts_with("You have 2 unread bookmarks."));
        assert!(sent["u2"].body.starts_with("You have 1 unread bookmark."));
    }

    #[tokio::test]
    async fn one_failing_user_does_not_block_others() {
        let repo = Arc::new(MemoryBookmarkRepo::new());
        repo.insert(bookmark("a", "u1", false));
        repo.insert(bookmark("b", "u2", false));
        repo.insert(bookmark("c", "u3", false));

        let sender = Arc::new(SelectiveSender {
            fail_users: vec!["u2".into()],
            ..Default::default()
        });
        let stats = aggregator(repo, sender.clone()).run_once().await.unwrap();

        assert_eq!(stats.users, 3);
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.failed, 1);
        let sent = sender.sent.lock().unwrap();
        assert!(sent.contains_key("u1"));
        assert!(sent.contains_key("u3"));
    }

    #[tokio::test]
    async fn empty_repo_is_a_quiet_pass() {
        let repo = Arc::new(MemoryBookmarkRepo::new());
        let sender = Arc::new(SelectiveSender::default());
        let stats = aggregator(repo, sender).run_once().await.unwrap();
        assert_eq!(stats.users, 0);
        assert_eq!(stats.sent, 0);
    }
}
