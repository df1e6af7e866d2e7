use std::time::Duration;

use chrono::Utc;

pub type Timestamp = chrono::DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}

/// Converts a timestamp into a value that binds as a SurrealQL `datetime` rather than a string.
pub fn datetime(timestamp: Timestamp) -> surrealdb::sql::Datetime {
    timestamp.into()
}

/// The instant before which an observation no longer falls inside the window ending at `now`.
///
/// A window too large to represent reaches back to the beginning of time.
pub fn cutoff(now: Timestamp, window: Duration) -> Timestamp {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(Timestamp::MIN_UTC)
}
