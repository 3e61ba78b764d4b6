//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, addresses parse)
//! - Check that the selected store backend has what it needs to connect
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServiceConfig, StoreBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("logging.directory must not be empty")]
    EmptyLogDirectory,

    #[error("logging.file_prefix must not be empty")]
    EmptyLogPrefix,

    #[error("store.{0} must not be empty")]
    EmptyStoreField(&'static str),

    #[error("store.port must be greater than zero")]
    ZeroStorePort,

    #[error("store.max_connections must be greater than zero")]
    ZeroStoreConnections,

    #[error("shutdown.grace_period_secs must be greater than zero")]
    ZeroGracePeriod,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("timeouts.header_read_secs must be greater than zero")]
    ZeroHeaderReadTimeout,

    #[error("timeouts.header_read_secs ({header_read_secs}) must be less than shutdown.grace_period_secs ({grace_period_secs})")]
    HeaderReadExceedsGrace {
        header_read_secs: u64,
        grace_period_secs: u64,
    },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if config.logging.directory.trim().is_empty() {
        errors.push(ValidationError::EmptyLogDirectory);
    }
    if config.logging.file_prefix.trim().is_empty() {
        errors.push(ValidationError::EmptyLogPrefix);
    }

    if config.store.backend == StoreBackend::Mysql {
        let store = &config.store;
        for (field, value) in [
            ("host", &store.host),
            ("user", &store.user),
            ("database", &store.database),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::EmptyStoreField(field));
            }
        }
        if store.port == 0 {
            errors.push(ValidationError::ZeroStorePort);
        }
        if store.max_connections == 0 {
            errors.push(ValidationError::ZeroStoreConnections);
        }
    }

    if config.shutdown.grace_period_secs == 0 {
        errors.push(ValidationError::ZeroGracePeriod);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.timeouts.header_read_secs == 0 {
        errors.push(ValidationError::ZeroHeaderReadTimeout);
    } else if config.shutdown.grace_period_secs > 0
        && config.timeouts.header_read_secs >= config.shutdown.grace_period_secs
    {
        errors.push(ValidationError::HeaderReadExceedsGrace {
            header_read_secs: config.timeouts.header_read_secs,
            grace_period_secs: config.shutdown.grace_period_secs,
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
