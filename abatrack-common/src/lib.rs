//! # ABA Track Common Library
//!
//! Shared code for the abatrack services including:
//! - Domain model (clients, behaviors, skills, sessions, events)
//! - API request/response types
//! - Error types
//! - Database schema and initialization
//! - Configuration resolution
//! - Timestamp utilities

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod time;

pub use error::{Error, Result};
