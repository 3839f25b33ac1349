//! Timestamp utilities

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// Fixed offset of the service territory's local clock from UTC, in hours.
///
/// Load shapes and crew staffing are expressed in Eastern Standard Time; daylight
/// saving is ignored, the models are not sensitive to a one hour shift.
pub const LOCAL_UTC_OFFSET_HOURS: i64 = -5;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Fractional hours from `from` to `to` (negative if `to` is earlier)
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// Hour of day (0-23) on the territory's local clock
pub fn local_hour(at: DateTime<Utc>) -> u32 {
    (at + Duration::hours(LOCAL_UTC_OFFSET_HOURS)).hour()
}

/// Calendar month (1-12) of a UTC timestamp
pub fn month(at: DateTime<Utc>) -> u32 {
    at.month()
}
