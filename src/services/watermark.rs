//! Sync watermark arithmetic
//!
//! The order search selects `closed_at >= watermark`, so after processing an
//! order the watermark must land strictly past its close time or the same
//! order is delivered again on the next run.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Next watermark after observing an order closed at `closed_at`.
///
/// Never moves backwards; an order at or before the current watermark leaves
/// it unchanged.
pub fn advance(closed_at: DateTime<Utc>, current: DateTime<Utc>, quantum: TimeDelta) -> DateTime<Utc> {
    if closed_at <= current {
        return current;
    }
    closed_at + quantum
}

/// Parse a stored watermark (RFC 3339 / ISO-8601)
pub fn parse_watermark(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|t| t.with_timezone(&Utc))
}

/// Render a watermark for storage: UTC, millisecond precision, `Z` suffix
pub fn format_watermark(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
