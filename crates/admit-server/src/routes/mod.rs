//! HTTP endpoints.

pub mod cache;
pub mod health;
pub mod realtime;
