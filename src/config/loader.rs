//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {name}: {message}")]
    Env { name: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, without environment overrides.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the startup configuration: optional file, then process environment, then validation.
pub fn load_startup_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_env(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides using the given lookup.
///
/// | Env Var             | Field                         |
/// |---------------------|-------------------------------|
/// | `PORT`              | port of `listener.bind_address` |
/// | `ALLOWED_ORIGINS`   | `cors.allowed_origins` (comma-separated) |
/// | `REDIS_URL`         | `store.url`                   |
/// | `COLLAB_ROOM_CHECK` | `rooms.existence_check`       |
/// | `STORE_TIMEOUT_MS`  | `store.timeout_ms`            |
pub fn apply_env<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            name: "PORT",
            message: format!("'{}' is not a valid port", port),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(url) = lookup("REDIS_URL") {
        config.store.url = url;
    }

    if let Some(mode) = lookup("COLLAB_ROOM_CHECK") {
        config.rooms.existence_check = mode.parse().map_err(|message| ConfigError::Env {
            name: "COLLAB_ROOM_CHECK",
            message,
        })?;
    }

    if let Some(ms) = lookup("STORE_TIMEOUT_MS") {
        config.store.timeout_ms = ms.trim().parse().map_err(|_| ConfigError::Env {
            name: "STORE_TIMEOUT_MS",
            message: format!("'{}' is not a number of milliseconds", ms),
        })?;
    }

    Ok(())
}
