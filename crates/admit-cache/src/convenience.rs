//! Named wrappers for the key shapes route handlers use.

use crate::{keys, TieredCache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;
use tracing::debug;

impl TieredCache {
    /// Caches a user's data under `user:<id>` for the configured user TTL.
    pub async fn cache_user_data<T: Serialize + ?Sized>(&self, user_id: impl Display, data: &T) {
        let ttl = Duration::from_secs(self.config().user_ttl_secs);
        self.set(&keys::user(user_id), data, ttl).await;
    }

    /// Reads a user's cached data.
    pub async fn get_user_data<T: DeserializeOwned>(&self, user_id: impl Display) -> Option<T> {
        self.get(&keys::user(user_id)).await
    }

    /// Caches a role's dashboard statistics for the configured dashboard TTL.
    pub async fn cache_dashboard_stats<T: Serialize + ?Sized>(&self, role: impl Display, stats: &T) {
        let ttl = Duration::from_secs(self.config().dashboard_ttl_secs);
        self.set(&keys::dashboard_stats(role), stats, ttl).await;
    }

    /// Reads a role's cached dashboard statistics.
    pub async fn get_dashboard_stats<T: DeserializeOwned>(&self, role: impl Display) -> Option<T> {
        self.get(&keys::dashboard_stats(role)).await
    }

    /// Caches an API response keyed by endpoint and parameters.
    pub async fn cache_api_response<P, T>(&self, endpoint: &str, params: &P, data: &T)
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        let ttl = Duration::from_secs(self.config().api_ttl_secs);
        self.set(&keys::api(endpoint, params), data, ttl).await;
    }

    /// Reads a cached API response.
    pub async fn get_api_response<P, T>(&self, endpoint: &str, params: &P) -> Option<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.get(&keys::api(endpoint, params)).await
    }

    /// Drops a user's cached data, the keys nested under it and every role's
    /// dashboard statistics.
    pub async fn invalidate_user(&self, user_id: impl Display) {
        let user_id = user_id.to_string();
        self.del(&keys::user(&user_id)).await;
        let nested = self.invalidate_pattern(&keys::user_pattern(&user_id)).await;
        let dashboards = self.invalidate_pattern(keys::DASHBOARD_STATS_PATTERN).await;
        debug!(user_id = %user_id, nested, dashboards, "Invalidated user cache");
    }
}

#[cfg(test)]
mod tests {
    use crate::TieredCache;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        stage: u8,
    }

    #[tokio::test]
    async fn test_user_data_round_trip() {
        let cache = TieredCache::default();
        let profile = Profile {
            name: "Grace".to_string(),
            stage: 2,
        };
        cache.cache_user_data("u100", &profile).await;
        assert_eq!(cache.get_user_data::<Profile>("u100").await, Some(profile));
        assert_eq!(cache.get_user_data::<Profile>("u101").await, None);
    }

    #[tokio::test]
    async fn test_api_response_keyed_by_params() {
        let cache = TieredCache::default();
        cache
            .cache_api_response("/programs", &json!({"page": 1}), &json!(["cs", "math"]))
            .await;

        let hit: Option<Vec<String>> = cache.get_api_response("/programs", &json!({"page": 1})).await;
        assert_eq!(hit, Some(vec!["cs".to_string(), "math".to_string()]));

        let other: Option<Vec<String>> =
            cache.get_api_response("/programs", &json!({"page": 2})).await;
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn test_invalidate_user_clears_dashboards() {
        let cache = TieredCache::default();
        cache.cache_user_data("u1", &json!({"name": "A"})).await;
        cache.cache_user_data("u2", &json!({"name": "B"})).await;
        cache.cache_dashboard_stats("admin", &json!({"total": 3})).await;
        cache.cache_dashboard_stats("agent", &json!({"total": 1})).await;

        cache.invalidate_user("u1").await;

        assert_eq!(cache.get_user_data::<serde_json::Value>("u1").await, None);
        assert!(cache.get_user_data::<serde_json::Value>("u2").await.is_some());
        assert_eq!(cache.get_dashboard_stats::<serde_json::Value>("admin").await, None);
        assert_eq!(cache.get_dashboard_stats::<serde_json::Value>("agent").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_user_clears_nested_keys_only_for_that_user() {
        let cache = TieredCache::default();
        let ttl = std::time::Duration::from_secs(60);
        cache.set("user:1:prefs", &json!({"theme": "dark"}), ttl).await;
        cache.set("user:1:documents", &json!(["transcript"]), ttl).await;
        cache.set("user:10", &json!({"name": "J"}), ttl).await;
        cache.set("user:10:prefs", &json!({"theme": "light"}), ttl).await;

        cache.invalidate_user(1).await;

        assert_eq!(cache.get::<serde_json::Value>("user:1:prefs").await, None);
        assert_eq!(cache.get::<serde_json::Value>("user:1:documents").await, None);
        assert!(cache.get::<serde_json::Value>("user:10").await.is_some());
        assert!(cache.get::<serde_json::Value>("user:10:prefs").await.is_some());
    }
}
