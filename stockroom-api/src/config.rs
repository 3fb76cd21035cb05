//! API Configuration Module
//!
//! Server binding plus the aggregate of every component's configuration,
//! loaded from environment variables with development-friendly defaults.

use std::net::SocketAddr;

use stockroom_core::{CacheConfig, EventConfig, RetryConfig, StockroomResult, StoreConfig};

use crate::error::{ApiError, ApiResult};

const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STOCKROOM_API_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT`, then `STOCKROOM_API_PORT`: Port to bind (default: 3000)
    ///
    /// An unparseable port is reported by [`ApiConfig::bind_addr`], not
    /// silently replaced.
    pub fn from_env() -> ApiResult<Self> {
        let host =
            std::env::var("STOCKROOM_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());
        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("STOCKROOM_API_PORT").ok())
        {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => DEFAULT_PORT,
        };
        Ok(Self { host, port })
    }

    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}

// ============================================================================
// APPLICATION CONFIGURATION
// ============================================================================

/// Configuration for every component wired by [`crate::state::AppState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub events: EventConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            store: StoreConfig::from_env(),
            events: EventConfig::from_env(),
        }
    }

    /// No store latency and millisecond retry backoff, for tests and local
    /// runs.
    pub fn development() -> Self {
        Self {
            cache: CacheConfig::default(),
            store: StoreConfig::development(),
            events: EventConfig {
                retry: RetryConfig::development(),
                ..EventConfig::default()
            },
        }
    }

    pub fn validate(&self) -> StockroomResult<()> {
        self.cache.validate()?;
        self.store.validate()?;
        self.events.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr() {
        let addr = ApiConfig::default().bind_addr().unwrap();
        assert_eq!(addr.port(), 3000);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let config = ApiConfig {
            host: "not a host".to_string(),
            port: 80,
        };
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_development_config_is_valid() {
        let config = AppConfig::development();
        assert!(config.validate().is_ok());
        assert!(config.store.latency.is_zero());
    }

    #[test]
    fn test_invalid_component_config_fails_validation() {
        let mut config = AppConfig::development();
        config.events.partitions = 0;
        assert!(config.validate().is_err());
    }
}
