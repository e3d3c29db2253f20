//! HTTP API handlers for abatrack-api

pub mod analysis;
pub mod auth;
pub mod catalog;
pub mod health;
pub mod sessions;
