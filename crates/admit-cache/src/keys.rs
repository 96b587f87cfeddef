//! Cache key generators for consistent key naming.

use serde::Serialize;
use std::fmt::Display;

/// Pattern covering every role's dashboard statistics.
pub const DASHBOARD_STATS_PATTERN: &str = "dashboard:*:stats";

/// Generate a cache key for a user's profile data.
#[must_use]
pub fn user(id: impl Display) -> String {
    format!("user:{}", id)
}

/// Generate a cache key for a role's dashboard statistics.
#[must_use]
pub fn dashboard_stats(role: impl Display) -> String {
    format!("dashboard:{}:stats", role)
}

/// Generate a cache key for an API response.
///
/// Parameters are rendered as JSON, so callers should pass maps with a stable
/// key order (structs or `BTreeMap`).
#[must_use]
pub fn api<P: Serialize + ?Sized>(endpoint: &str, params: &P) -> String {
    let params = serde_json::to_string(params).unwrap_or_else(|_| "null".to_string());
    format!("api:{}:{}", endpoint, params)
}

/// Pattern matching every key nested under a user's key, such as
/// `user:<id>:documents`. The user's own key is not included.
#[must_use]
pub fn user_pattern(id: impl Display) -> String {
    format!("user:{}:*", id)
}
