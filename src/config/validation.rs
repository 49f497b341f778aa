//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats. All
//! errors are returned, not just the first.

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    } else if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    if config.store.timeout_ms == 0 {
        errors.push(ValidationError::new("store.timeout_ms", "must be greater than 0"));
    }

    match url::Url::parse(&config.store.url) {
        Ok(url) if matches!(url.scheme(), "redis" | "rediss" | "memory") => {}
        Ok(url) => errors.push(ValidationError::new(
            "store.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("store.url", e.to_string())),
    }

    for origin in &config.cors.allowed_origins {
        if !is_bare_host(origin) {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' must be a bare host[:port]", origin),
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host[:port]` round-trips through URL parsing unchanged.
fn is_bare_host(origin: &str) -> bool {
    if origin.is_empty() || origin.contains('/') {
        return false;
    }
    match url::Url::parse(&format!("http://{}", origin)) {
        Ok(url) => {
            let host = match url.host_str() {
                Some(h) => h,
                None => return false,
            };
            let rebuilt = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            rebuilt.eq_ignore_ascii_case(origin) && url.username().is_empty()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.max_connections = 0;
        config.store.timeout_ms = 0;
        config.store.url = "postgres://db/x".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "store.url"));
    }

    #[test]
    fn rejects_origins_with_scheme_or_path() {
        let mut config = GatewayConfig::default();
        config.cors.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "example.com/app".to_string(),
            "example.com:8443".to_string(),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn memory_store_url_is_accepted() {
        let mut config = GatewayConfig::default();
        config.store.url = "memory://".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
