//! Timestamp utilities
//!
//! Timestamps are persisted as Unix milliseconds so that SQL ordering is numeric.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a timestamp to Unix milliseconds for storage
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a timestamp
///
/// Returns `None` for values outside chrono's representable range.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
