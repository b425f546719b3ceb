//! Error taxonomy for the reminder core.

use thiserror::Error;

/// Result alias used throughout LinkMind crates.
pub type Result<T> = std::result::Result<T, LinkMindError>;

/// Errors the reminder core can produce. None of these are fatal to the
/// process — every periodic loop logs and retries on its own next tick.
#[derive(Debug, Error)]
pub enum LinkMindError {
    /// The claim token no longer matches the stored one: the claim was
    /// superseded by a reschedule, cancel, or expiry reclaim. Callers
    /// treat this as "someone else already resolved the task".
    #[error("stale claim token")]
    StaleClaim,

    /// A bookmark or task vanished between steps — implicit cancellation.
    #[error("not found: {0}")]
    NotFound(String),

    /// The task store itself failed. The triggering caller must not
    /// report the mutation as scheduled; the sweeper picks it up later.
    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("send error: {0}")]
    Send(String),
}
