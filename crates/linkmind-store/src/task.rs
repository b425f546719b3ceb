//! Reminder task data model — one record per bookmark-with-pending-reminder.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a reminder task.
///
/// `Scheduled -[claim]-> Claimed -[deliver ok]-> Delivered`
/// `Claimed -[retryable, attempts left]-> Scheduled` (backoff)
/// `Claimed -[terminal / attempts exhausted]-> Failed`
/// `Scheduled|Claimed -[read/deleted/rescheduled]-> Cancelled`
/// `Claimed -[claim timeout]-> Scheduled` (no attempt increment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Scheduled,
    Claimed,
    Delivered,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Live states participate in the per-bookmark uniqueness invariant.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Claimed)
    }

    /// Terminal states are retained for audit, then purged — never reused.
    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Claimed => "claimed",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "claimed" => Self::Claimed,
            "delivered" => Self::Delivered,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Scheduled,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled dispatch record. The store exclusively owns these rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderTask {
    /// Unique task ID (uuid v4).
    pub id: String,
    /// At most one live task per bookmark.
    pub bookmark_id: String,
    pub user_id: String,
    /// Eligible for dispatch once `due_at <= now`.
    pub due_at: DateTime<Utc>,
    pub state: TaskState,
    /// Failed send attempts so far. Starts at 0.
    pub attempt: u32,
    /// Set while Claimed; a `complete` call must present it back.
    pub claim_token: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderTask {
    pub fn new(bookmark_id: &str, user_id: &str, due_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            bookmark_id: bookmark_id.to_string(),
            user_id: user_id.to_string(),
            due_at,
            state: TaskState::Scheduled,
            attempt: 0,
            claim_token: None,
            claimed_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Retry policy for failed sends: `base * 2^attempt`, capped.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before the next attempt, given the number of failures so far.
    pub fn delay(&self, prior_attempts: u32) -> Duration {
        // Shift saturates well before chrono overflows for any sane config.
        let factor = 2i64.checked_pow(prior_attempts.min(30)).unwrap_or(i64::MAX);
        let delay = self
            .base
            .checked_mul(factor as i32)
            .unwrap_or(self.cap);
        delay.min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::seconds(30),
            cap: Duration::seconds(3_600),
            max_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = BackoffPolicy {
            base: Duration::seconds(30),
            cap: Duration::seconds(300),
            max_attempts: 5,
        };
        assert_eq!(policy.delay(0), Duration::seconds(30));
        assert_eq!(policy.delay(1), Duration::seconds(60));
        assert_eq!(policy.delay(2), Duration::seconds(120));
        assert_eq!(policy.delay(3), Duration::seconds(240));
        assert_eq!(policy.delay(4), Duration::seconds(300));
        assert_eq!(policy.delay(20), Duration::seconds(300));
    }

    #[test]
    fn state_roundtrip_and_liveness() {
        for state in [
            TaskState::Scheduled,
            TaskState::Claimed,
            TaskState::Delivered,
            TaskState::Failed,
            TaskState::Cancelled,
        ] {
            assert_eq!(TaskState::parse(state.as_str()), state);
            assert_ne!(state.is_live(), state.is_terminal());
        }
        assert!(TaskState::Scheduled.is_live());
        assert!(TaskState::Claimed.is_live());
        assert!(TaskState::Delivered.is_terminal());
    }

    #[test]
    fn new_task_starts_scheduled() {
        let now = Utc::now();
        let task = ReminderTask::new("b1", "u1", now + Duration::days(1), now);
        assert_eq!(task.state, TaskState::Scheduled);
        assert_eq!(task.attempt, 0);
        assert!(task.claim_token.is_none());
    }
}
