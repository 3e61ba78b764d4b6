//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the record service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Log sink settings.
    pub logging: LoggingConfig,

    /// Backing store connection settings.
    pub store: StoreConfig,

    /// Shutdown budget.
    pub shutdown: ShutdownConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:50051").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50051".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Log sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory holding the dated log files. Created on startup.
    pub directory: String,

    /// File name prefix; the file is `<prefix>-<YYYY-MM-DD>.log`.
    pub file_prefix: String,

    /// Log level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "record-service".to_string(),
            level: "info".to_string(),
        }
    }
}

/// Which store implementation to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// MySQL wire protocol (MySQL, TiDB).
    Mysql,
    /// Process-local map, nothing survives a restart.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "tidb" => Ok(StoreBackend::Mysql),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Store host name or address.
    pub host: String,

    /// Store port (TiDB listens on 4000 by default).
    pub port: u16,

    /// User to authenticate as.
    pub user: String,

    /// Optional password; empty means none.
    pub password: Option<String>,

    /// Database (schema) name.
    pub database: String,

    /// Upper bound on pooled connections shared by all handlers.
    pub max_connections: u32,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Mysql,
            host: "127.0.0.1".to_string(),
            port: 4000,
            user: "root".to_string(),
            password: None,
            database: "test".to_string(),
            max_connections: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time in seconds in-flight requests get to finish before they are aborted.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 10,
        }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

/// Timeout configuration for request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Budget for a client to finish sending request headers, in seconds.
    /// Must stay below the shutdown grace period so a stalled client cannot
    /// hold up a graceful stop.
    pub header_read_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            header_read_secs: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:50051");
        assert_eq!(config.logging.directory, "logs");
        assert_eq!(config.shutdown.grace_period(), Duration::from_secs(10));
        assert_eq!(config.store.backend, StoreBackend::Mysql);
        assert!(config.store.password.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [store]
            backend = "memory"
            database = "records"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.database, "records");
        assert_eq!(config.store.port, 4000);
        assert_eq!(config.listener.max_connections, 10_000);
    }

    #[test]
    fn backend_parses_tidb_alias() {
        assert_eq!("TiDB".parse::<StoreBackend>(), Ok(StoreBackend::Mysql));
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }
}
