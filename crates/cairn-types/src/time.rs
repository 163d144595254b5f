//! Canonical timestamp form for schema blobs.
//!
//! Schema timestamps (`claimDate`, `unixMtime`, ...) are RFC3339 in UTC.
//! Fractional seconds are written only when the instant has a non-zero
//! sub-second component, with trailing zeros trimmed, so whole-second
//! timestamps round-trip byte-identically.

use chrono::{DateTime, Utc};

use crate::error::TypeError;

/// Format `t` in the canonical schema form.
pub fn rfc3339_from_time(t: DateTime<Utc>) -> String {
    let mut out = t.format("%Y-%m-%dT%H:%M:%S").to_string();
    // Leap seconds carry the extra second in the nanos; `%S` already prints 60.
    let nanos = t.timestamp_subsec_nanos() % 1_000_000_000;
    if nanos != 0 {
        let frac = format!("{nanos:09}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push('Z');
    out
}

/// Parse an RFC3339 timestamp with any offset, normalized to UTC.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TypeError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })
}

/// Unix nanoseconds of an RFC3339 timestamp, or `None` if it doesn't parse
/// or falls outside the representable range.
pub fn nanos_from_rfc3339(s: &str) -> Option<i64> {
    parse_rfc3339(s).ok()?.timestamp_nanos_opt()
}
