//! abatrack-collector - offline-tolerant session collection engine
//!
//! Sits between a collection UI and abatrack-api. UI actions mutate a
//! local [`buffer::SessionBuffer`] instantly and append outbound events
//! to per-kind queues; the [`sync`] layer pushes those queues to the
//! durable store on a 60 second cadence (best effort) and with bounded
//! retries at session end. A lost network never loses an already-queued
//! event, only delays it.

pub mod buffer;
pub mod error;
pub mod session;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::SessionBuffer;
pub use error::{CollectorError, Result};
pub use session::{SessionPhase, SessionRunner};
pub use store::{EventStore, HttpEventStore};
