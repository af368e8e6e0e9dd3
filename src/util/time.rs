//! Wall-clock helpers.

use chrono::Utc;

use crate::snapshot::TimestampMs;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> TimestampMs {
    Utc::now().timestamp_millis()
}
