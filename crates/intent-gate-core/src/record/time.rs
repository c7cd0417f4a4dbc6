//! Timestamp parsing for record fields.
//!
//! Accepted forms, tried in order:
//!
//! | Form | Example | Zone |
//! |------|---------|------|
//! | RFC 3339 | `2025-01-02T12:00:00-08:00` | as written |
//! | naive ISO 8601 | `2025-01-02T12:00:00`, `2025-01-02 12:00:00` | UTC |
//! | date | `2025-01-02` | UTC midnight |
//! | compact stamp | `20250102-120000Z` | UTC |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const COMPACT_FORMAT: &str = "%Y%m%d-%H%M%SZ";

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // RFC 3339 with a space separator, e.g. `2025-01-02 12:00:00+00:00`.
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    NaiveDateTime::parse_from_str(s, COMPACT_FORMAT)
        .ok()
        .map(|n| n.and_utc())
}
