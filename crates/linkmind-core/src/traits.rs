//! Collaborator interfaces — the seams where bookmark storage and the
//! push transport plug into the reminder core.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Bookmark, PushMessage};

/// Outcome of one push send, as classified by the transport. Retryable vs
/// terminal is the transport's call; the task store decides what to do
/// with it (backoff reschedule vs Failed).
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Delivered,
    /// Transient failure (timeout, 5xx, rate limit) — worth retrying.
    Retryable(String),
    /// Permanent failure (unregistered device, bad payload) — never retried.
    Terminal(String),
}

/// Push notification transport. The physical delivery to a device is
/// behind this trait and out of scope for the core.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, user_id: &str, message: &PushMessage) -> SendOutcome;
}

/// Read access to bookmark state, owned by the CRUD collaborator.
#[async_trait]
pub trait BookmarkRepo: Send + Sync {
    /// Current state of one bookmark, or None if it was deleted.
    async fn get(&self, bookmark_id: &str) -> Result<Option<Bookmark>>;

    /// Unread bookmarks whose reminder time has passed — sweeper input.
    async fn unread_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Bookmark>>;

    /// All unread bookmarks grouped per user — digest input.
    async fn unread_by_user(&self) -> Result<HashMap<String, Vec<Bookmark>>>;
}
