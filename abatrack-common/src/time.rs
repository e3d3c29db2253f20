//! Timestamp parsing and formatting
//!
//! Timestamps are RFC 3339 / ISO-8601 strings on the wire and in the
//! database; calendar dates are `yyyy-mm-dd`.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

/// Format a timestamp for storage or the wire
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse an ISO-8601 timestamp, accepting a trailing `Z`
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Parse a `yyyy-mm-dd` calendar date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid date '{}' (want yyyy-mm-dd): {}", s, e)))
}

/// Calendar date an event belongs to for aggregation (UTC truncation)
pub fn date_key(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}
