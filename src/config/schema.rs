//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the header bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Node backend and listener settings.
    pub node: NodeConfig,

    /// Shutdown trigger settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Which implementation of the foreign node to supervise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeBackendKind {
    /// In-process Tokio listener shipped with this crate.
    #[default]
    Embedded,
    /// Shared library exporting the start/stop symbols.
    Dylib,
}

/// Node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Bind address (e.g., "127.0.0.1:60000").
    pub bind_address: String,

    /// Node implementation.
    pub backend: NodeBackendKind,

    /// Shared library path (dylib backend only).
    pub library_path: Option<PathBuf>,

    /// Exported start symbol (dylib backend only).
    pub start_symbol: String,

    /// Exported stop symbol (dylib backend only).
    pub stop_symbol: String,

    /// Maximum concurrent connections (embedded backend).
    pub max_connections: usize,

    /// Largest accepted header block in bytes (embedded backend).
    pub max_header_bytes: usize,

    /// Time allowed for a client to send its header block (embedded backend).
    pub header_timeout_secs: u64,

    /// Runtime worker threads (embedded backend).
    pub worker_threads: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:60000".to_string(),
            backend: NodeBackendKind::Embedded,
            library_path: None,
            start_symbol: "startNode".to_string(),
            stop_symbol: "stopNode".to_string(),
            max_connections: 1_024,
            max_header_bytes: 16 * 1024,
            header_timeout_secs: 10,
            worker_threads: 2,
        }
    }
}

/// Shutdown trigger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Console line that stops the node.
    pub sentinel: String,

    /// Treat end of console input as a stop request.
    pub stop_on_eof: bool,

    /// Stop on SIGINT/SIGTERM.
    pub handle_signals: bool,

    /// Stop automatically after this many seconds.
    pub deadline_secs: Option<u64>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            sentinel: "q".to_string(),
            stop_on_eof: true,
            handle_signals: true,
            deadline_secs: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "header_bridge=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
