//! Application configuration structures.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote cache tier (Redis) configuration.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Tiered cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Realtime event router configuration.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// JWT configuration used for authenticated room joins.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "admit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl AppMetadata {
    /// Returns true when running with the production profile.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// CORS allowed origins for the REST endpoints.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Returns the bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Redis configuration for the remote cache tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL. Empty means local-only mode.
    pub url: String,
    /// Connection pool size.
    pub pool_size: usize,
    /// Enable Redis (can be disabled for local development).
    pub enabled: bool,
    /// Upper bound for any single remote operation, in milliseconds.
    pub operation_timeout_ms: u64,
    /// Prefix prepended to every key stored in Redis.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            enabled: true,
            operation_timeout_ms: 2000,
            key_prefix: String::new(),
        }
    }
}

impl RedisConfig {
    /// Returns the URL to connect to, or `None` in local-only mode.
    #[must_use]
    pub fn connection_url(&self) -> Option<&str> {
        if self.enabled && !self.url.trim().is_empty() {
            Some(self.url.as_str())
        } else {
            None
        }
    }

    /// Returns the remote operation timeout as a Duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Tiered cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL used when a caller passes zero.
    pub default_ttl_secs: u64,
    /// TTL for `user:<id>` entries.
    pub user_ttl_secs: u64,
    /// TTL for `dashboard:<role>:stats` entries.
    pub dashboard_ttl_secs: u64,
    /// TTL for `api:<endpoint>:<params>` entries.
    pub api_ttl_secs: u64,
    /// Maximum number of local entries (0 = unbounded).
    pub local_max_entries: usize,
    /// Interval between sweeps of expired local entries, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 600,
            user_ttl_secs: 1800,
            dashboard_ttl_secs: 300,
            api_ttl_secs: 600,
            local_max_entries: 0,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    /// Returns the default TTL as a Duration.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Returns the sweep interval as a Duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// How room joins are authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Any connection may join any room.
    #[default]
    Open,
    /// Joins must match the identity carried by the handshake token.
    Authenticated,
}

/// Realtime event router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Origins allowed to open a connection.
    pub allowed_origins: Vec<String>,
    /// HTTP methods accepted for the handshake.
    pub allowed_methods: Vec<String>,
    /// Path the WebSocket endpoint is mounted at.
    pub path: String,
    /// Join authorization policy.
    pub join_policy: JoinPolicy,
    /// Outbound buffer per connection, in messages.
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            path: "/ws".to_string(),
            join_policy: JoinPolicy::Open,
            channel_capacity: 64,
        }
    }
}

impl RealtimeConfig {
    /// Checks whether an origin is on the allow-list.
    #[must_use]
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed.trim_end_matches('/') == origin)
    }

    /// Checks whether a handshake method is allowed.
    #[must_use]
    pub fn is_method_allowed(&self, method: &str) -> bool {
        self.allowed_methods
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }
}

/// Security configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// JWT secret key.
    pub jwt_secret: String,
    /// JWT issuer.
    pub jwt_issuer: String,
    /// JWT audience.
    pub jwt_audience: String,
}

/// Placeholder secret shipped in the defaults.
pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_issuer: "admit".to_string(),
            jwt_audience: "admit-realtime".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: String,
    /// Enable metrics.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}
