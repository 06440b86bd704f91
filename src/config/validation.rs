//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the bind and metrics addresses parse
//! - Check backend-specific requirements (dylib needs a library path)
//! - Validate value ranges (limits > 0, sentinel non-empty)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{BridgeConfig, NodeBackendKind};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let node = &config.node;

    if node.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "node.bind_address",
            format!("'{}' is not a host:port socket address", node.bind_address),
        ));
    }

    match node.backend {
        NodeBackendKind::Dylib => {
            if node.library_path.is_none() {
                errors.push(ValidationError::new(
                    "node.library_path",
                    "required when backend = \"dylib\"",
                ));
            }
            if node.start_symbol.is_empty() {
                errors.push(ValidationError::new("node.start_symbol", "must not be empty"));
            }
            if node.stop_symbol.is_empty() {
                errors.push(ValidationError::new("node.stop_symbol", "must not be empty"));
            }
        }
        NodeBackendKind::Embedded => {
            if node.max_connections == 0 {
                errors.push(ValidationError::new("node.max_connections", "must be > 0"));
            }
            if node.max_header_bytes == 0 {
                errors.push(ValidationError::new("node.max_header_bytes", "must be > 0"));
            }
            if node.header_timeout_secs == 0 {
                errors.push(ValidationError::new("node.header_timeout_secs", "must be > 0"));
            }
            if node.worker_threads == 0 {
                errors.push(ValidationError::new("node.worker_threads", "must be > 0"));
            }
        }
    }

    if config.shutdown.sentinel.trim().is_empty() {
        errors.push(ValidationError::new("shutdown.sentinel", "must not be blank"));
    }
    if config.shutdown.deadline_secs == Some(0) {
        errors.push(ValidationError::new("shutdown.deadline_secs", "must be > 0 when set"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a host:port socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&BridgeConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = BridgeConfig::default();
        config.node.bind_address = "not-an-address".into();
        config.node.max_header_bytes = 0;
        config.shutdown.sentinel = "  ".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["node.bind_address", "node.max_header_bytes", "shutdown.sentinel"]
        );
    }

    #[test]
    fn dylib_requires_library() {
        let mut config = BridgeConfig::default();
        config.node.backend = NodeBackendKind::Dylib;
        config.node.max_connections = 0; // ignored for dylib

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "node.library_path");
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = BridgeConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
