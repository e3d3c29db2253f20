//! Database operations for abatrack-api
//!
//! Row mapping is explicit: ids are uuid TEXT, timestamps RFC 3339 TEXT.

pub mod analysis;
pub mod catalog;
pub mod sessions;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use abatrack_common::{Error, Result};

pub(crate) fn parse_guid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt guid '{}': {}", s, e)))
}

pub(crate) fn parse_stored_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Corrupt timestamp '{}': {}", s, e)))
}
