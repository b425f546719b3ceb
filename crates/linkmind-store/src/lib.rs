//! # LinkMind Store
//!
//! Durable reminder task records and the bookmark mirror, both on SQLite.
//! The task store is the sole shared mutable resource of the scheduling
//! core: it enforces the one-live-task-per-bookmark invariant and the
//! atomic claim/complete semantics that keep concurrent workers from
//! double-dispatching.

pub mod bookmarks;
pub mod store;
pub mod task;

pub use bookmarks::SqliteBookmarkRepo;
pub use store::TaskStore;
pub use task::{BackoffPolicy, ReminderTask, TaskState};
