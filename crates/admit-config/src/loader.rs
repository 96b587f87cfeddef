//! Configuration loader with layered sources.

use crate::{AppConfig, JoinPolicy, DEFAULT_JWT_SECRET};
use admit_core::AdmitError;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use tracing::{debug, info, warn};

/// Configuration loader over layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: AppConfig,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides
    /// 4. Environment variables with `ADMIT__` prefix
    pub fn new(config_dir: impl AsRef<str>) -> Result<Self, AdmitError> {
        let config = Self::load_config(config_dir.as_ref())?;
        Ok(Self { config })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, AdmitError> {
        Self::new("./config")
    }

    /// Consumes the loader, returning the validated configuration.
    #[must_use]
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &str) -> Result<AppConfig, AdmitError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("ADMIT_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ADMIT")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("realtime.allowed_origins")
                .with_list_parse_key("realtime.allowed_methods")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_admit_error)?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_admit_error)?;

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration.
    pub fn validate_config(config: &AppConfig) -> Result<(), AdmitError> {
        if config.server.port == 0 {
            return Err(AdmitError::Configuration(
                "server.port must be non-zero".to_string(),
            ));
        }

        if config.redis.operation_timeout_ms == 0 {
            return Err(AdmitError::Configuration(
                "redis.operation_timeout_ms must be non-zero".to_string(),
            ));
        }

        if config.cache.default_ttl_secs == 0 {
            return Err(AdmitError::Configuration(
                "cache.default_ttl_secs must be non-zero".to_string(),
            ));
        }

        if config.realtime.allowed_origins.is_empty() {
            return Err(AdmitError::Configuration(
                "realtime.allowed_origins must list at least one origin".to_string(),
            ));
        }

        if config.realtime.channel_capacity == 0 {
            return Err(AdmitError::Configuration(
                "realtime.channel_capacity must be non-zero".to_string(),
            ));
        }

        if config.realtime.join_policy == JoinPolicy::Authenticated {
            if config.security.jwt_secret.is_empty() {
                return Err(AdmitError::Configuration(
                    "security.jwt_secret is required for authenticated joins".to_string(),
                ));
            }
            if config.app.is_production() && config.security.jwt_secret == DEFAULT_JWT_SECRET {
                warn!("Using default JWT secret in production! This is a security risk.");
            }
        }

        Ok(())
    }
}

fn config_error_to_admit_error(err: ConfigError) -> AdmitError {
    AdmitError::Configuration(err.to_string())
}
