//! # LinkMind Core
//!
//! Shared foundation for the reminder scheduling and dispatch service:
//! domain model, reminder policy, configuration, error taxonomy, the clock
//! abstraction, and the traits that external collaborators (bookmark CRUD,
//! push transport) plug into.

pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod policy;
pub mod repo;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LinkMindConfig;
pub use error::{LinkMindError, Result};
pub use model::{Bookmark, PushMessage, ReminderInterval};
pub use repo::MemoryBookmarkRepo;
pub use traits::{BookmarkRepo, NotificationSender, SendOutcome};
