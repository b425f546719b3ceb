//! Domain model — bookmarks, reminder intervals, and push payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-selected reminder interval. Closed set matching the client UI.
/// "3s" exists for end-to-end testing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderInterval {
    #[serde(rename = "3s")]
    ThreeSeconds,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
}

impl ReminderInterval {
    /// Parse a client-supplied interval string. Total: unknown values fall
    /// back to the default — a malformed value must never block scheduling.
    pub fn parse(s: &str) -> Self {
        match s {
            "3s" => Self::ThreeSeconds,
            "1d" => Self::OneDay,
            "3d" => Self::ThreeDays,
            "1w" => Self::OneWeek,
            "1m" => Self::OneMonth,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeSeconds => "3s",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1m",
        }
    }
}

impl Default for ReminderInterval {
    fn default() -> Self {
        Self::OneDay
    }
}

impl std::fmt::Display for ReminderInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A saved link. Owned by the bookmark CRUD collaborator — the core reads
/// these fields and never writes them directly.
///
/// While `is_read == false`, `next_reminder_at` equals the last
/// (re)schedule time plus the interval's duration. While `is_read == true`
/// the field is stale and ignored until the bookmark is marked unread again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: Option<String>,
    pub reminder_interval: ReminderInterval,
    pub next_reminder_at: DateTime<Utc>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Display title — falls back to the URL when no title was fetched.
    pub fn display_title(&self) -> &str {
        match &self.title {
            Some(t) if !t.is_empty() => t,
            _ => &self.url,
        }
    }
}

/// Outbound push notification content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Set for per-bookmark reminders, absent for digests.
    pub bookmark_id: Option<String>,
}

impl PushMessage {
    /// The per-bookmark reminder nudge.
    pub fn reminder(bookmark: &Bookmark) -> Self {
        Self {
            title: "Time to read!".into(),
            body: format!("Check out: {}", bookmark.display_title()),
            bookmark_id: Some(bookmark.id.clone()),
        }
    }

    /// The daily digest summary for one user.
    pub fn digest(unread: &[Bookmark]) -> Self {
        let mut body = format!(
            "You have {} unread bookmark{}.",
            unread.len(),
            if unread.len() == 1 { "" } else { "s" }
        );
        for bookmark in unread.iter().take(5) {
            body.push_str("\n• ");
            body.push_str(bookmark.display_title());
        }
        Self {
            title: "Your reading list".into(),
            body,
            bookmark_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(title: Option<&str>) -> Bookmark {
        Bookmark {
            id: "b1".into(),
            user_id: "u1".into(),
            url: "https://example.com/article".into(),
            title: title.map(Into::into),
            reminder_interval: ReminderInterval::OneDay,
            next_reminder_at: Utc::now(),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn parse_is_total() {
        assert_eq!(ReminderInterval::parse("1w"), ReminderInterval::OneWeek);
        assert_eq!(ReminderInterval::parse("3s"), ReminderInterval::ThreeSeconds);
        // Garbage falls back to the default instead of failing
        assert_eq!(ReminderInterval::parse("fortnight"), ReminderInterval::OneDay);
        assert_eq!(ReminderInterval::parse(""), ReminderInterval::OneDay);
    }

    #[test]
    fn reminder_message_uses_title_or_url() {
        let msg = PushMessage::reminder(&bookmark(Some("A Great Read")));
        assert_eq!(msg.title, "Time to read!");
        assert_eq!(msg.body, "Check out: A Great Read");
        assert_eq!(msg.bookmark_id.as_deref(), Some("b1"));

        let msg = PushMessage::reminder(&bookmark(None));
        assert_eq!(msg.body, "Check out: https://example.com/article");
    }

    #[test]
    fn digest_message_caps_listing() {
        let many: Vec<Bookmark> = (0..8).map(|_| bookmark(Some("t"))).collect();
        let msg = PushMessage::digest(&many);
        assert!(msg.body.starts_with("You have 8 unread bookmarks."));
        assert_eq!(msg.body.matches('•').count(), 5);
        assert!(msg.bookmark_id.is_none());
    }
}
