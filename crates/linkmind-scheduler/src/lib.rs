//! # LinkMind Scheduler
//!
//! The reminder scheduling and dispatch core. Bookmark lifecycle events
//! flow through the Scheduling Gateway into the task store; independent
//! tokio loops drive the Dispatch Worker, the Reconciliation Sweeper, and
//! the daily Digest Aggregator.
//!
//! ```text
//! bookmark event ──> SchedulingGateway ──> TaskStore (upsert/cancel)
//!
//! every few secs ──> DispatchWorker ── claim_due ──> NotificationSender
//!                                   └─ complete (delivered/retry/failed)
//! every minute  ──> ReconciliationSweeper (repairs lost tasks, purges audit)
//! once a day    ──> DigestAggregator (one summary push per user)
//! ```

pub mod digest;
pub mod gateway;
pub mod sweeper;
pub mod transport;
pub mod worker;

pub use digest::{DigestAggregator, DigestStats, spawn_digest_loop};
pub use gateway::SchedulingGateway;
pub use sweeper::{ReconciliationSweeper, SweepStats, spawn_sweep_loop};
pub use transport::{LogSender, WebhookSender};
pub use worker::{DispatchStats, DispatchWorker, spawn_dispatch_loop};
