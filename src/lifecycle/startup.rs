//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the configured node backend
//! - Wire every configured shutdown source into one trigger
//!
//! # Design Decisions
//! - Fail fast: a library that cannot be loaded is fatal before anything starts
//! - Shutdown sources are forwarded on their own threads; the first one wins

use std::ffi::{c_void, CStr};
use std::net::SocketAddr;
use std::time::Duration;

use crate::bridge::{ForeignNode, HeaderCallback};
use crate::config::{NodeBackendKind, NodeConfig, ShutdownConfig};
use crate::lifecycle::shutdown::{Deadline, Shutdown, ShutdownListener, StdinSentinel};
use crate::lifecycle::signals::SignalTrigger;
use crate::node::{DylibError, DylibNode, EmbeddedNode, NodeOptions};

/// The node backend selected by configuration.
#[derive(Debug)]
pub enum NodeBackend {
    Embedded(EmbeddedNode),
    Dylib(DylibNode),
}

impl NodeBackend {
    pub fn from_config(config: &NodeConfig) -> Result<Self, DylibError> {
        match (config.backend, &config.library_path) {
            (NodeBackendKind::Dylib, Some(path)) => Ok(NodeBackend::Dylib(DylibNode::load(
                path,
                &config.start_symbol,
                &config.stop_symbol,
            )?)),
            (NodeBackendKind::Dylib, None) => {
                // Validation rejects this; fall back rather than guess a path.
                tracing::warn!("Dylib backend without library_path; using embedded node");
                Ok(NodeBackend::Embedded(EmbeddedNode::new(NodeOptions::from(config))))
            }
            (NodeBackendKind::Embedded, _) => {
                Ok(NodeBackend::Embedded(EmbeddedNode::new(NodeOptions::from(config))))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeBackend::Embedded(_) => "embedded",
            NodeBackend::Dylib(_) => "dylib",
        }
    }

    /// The bound address, when the backend can report it.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            NodeBackend::Embedded(node) => node.local_addr(),
            NodeBackend::Dylib(_) => None,
        }
    }
}

// SAFETY: delegates to backends that uphold the contract themselves.
unsafe impl ForeignNode for NodeBackend {
    unsafe fn start(
        &self,
        address: &CStr,
        callback: HeaderCallback,
        user: *mut c_void,
    ) -> *mut c_void {
        match self {
            NodeBackend::Embedded(node) => unsafe { node.start(address, callback, user) },
            NodeBackend::Dylib(node) => unsafe { node.start(address, callback, user) },
        }
    }

    unsafe fn stop(&self, handle: *mut *mut c_void) {
        match self {
            NodeBackend::Embedded(node) => unsafe { node.stop(handle) },
            NodeBackend::Dylib(node) => unsafe { node.stop(handle) },
        }
    }
}

/// A trigger that fires on the first configured shutdown source.
pub fn shutdown_listener(config: &ShutdownConfig) -> ShutdownListener {
    let shutdown = Shutdown::new();
    let listener = shutdown.subscribe();

    let console = StdinSentinel::stdin(config.sentinel.as_str()).stop_on_eof(config.stop_on_eof);
    shutdown.forward(console);
    if config.handle_signals {
        shutdown.forward(SignalTrigger::new());
    }
    if let Some(secs) = config.deadline_secs {
        shutdown.forward(Deadline(Duration::from_secs(secs)));
    }

    tracing::debug!(
        sentinel = %config.sentinel,
        signals = config.handle_signals,
        deadline_secs = ?config.deadline_secs,
        "Shutdown sources armed"
    );
    listener
}
