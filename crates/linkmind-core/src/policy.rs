//! Reminder policy — the pure mapping from interval to duration.

use chrono::{DateTime, Duration, Utc};

use crate::model::ReminderInterval;

/// Duration implied by an interval. "1m" is 30 days, matching the client.
pub fn duration_for(interval: ReminderInterval) -> Duration {
    match interval {
        ReminderInterval::ThreeSeconds => Duration::seconds(3),
        ReminderInterval::OneDay => Duration::days(1),
        ReminderInterval::ThreeDays => Duration::days(3),
        ReminderInterval::OneWeek => Duration::weeks(1),
        ReminderInterval::OneMonth => Duration::days(30),
    }
}

/// When a bookmark (re)scheduled at `now` should next be reminded.
pub fn next_due(now: DateTime<Utc>, interval: ReminderInterval) -> DateTime<Utc> {
    now + duration_for(interval)
}
