//! Foreign node backends.
//!
//! # Data Flow
//! ```text
//! Embedded node (server.rs):
//!     TCP connection
//!         → listener.rs (accept, connection limit)
//!         → connection.rs (tracking for shutdown)
//!         → headers.rs (read request head)
//!         → C-ABI callback on a `header-node` worker thread
//!
//! Dylib node (dylib.rs):
//!     shared library exporting startNode / stopNode
//! ```
//!
//! # Design Decisions
//! - Both backends are driven only through `ForeignNode`, so the supervisor
//!   cannot tell them apart
//! - The embedded node owns its runtime; its stop joins every connection task
//!   before returning

pub mod connection;
pub mod dylib;
pub mod headers;
pub mod listener;
pub mod server;

pub use dylib::{DylibError, DylibNode};
pub use server::{NodeError, NodeInstance};

use std::ffi::{c_void, CStr};
use std::net::SocketAddr;
use std::ptr;
use std::sync::Mutex;
use std::time::Duration;

use crate::bridge::{ForeignNode, HeaderCallback};
use crate::config::NodeConfig;
use server::CallbackTarget;

/// Tuning for the embedded node.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub max_connections: usize,
    pub max_header_bytes: usize,
    pub header_timeout: Duration,
    pub worker_threads: usize,
}

impl Default for NodeOptions {
    fn default() -> Self {
        NodeOptions::from(&NodeConfig::default())
    }
}

impl From<&NodeConfig> for NodeOptions {
    fn from(config: &NodeConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            max_header_bytes: config.max_header_bytes,
            header_timeout: Duration::from_secs(config.header_timeout_secs),
            worker_threads: config.worker_threads,
        }
    }
}

/// In-process node: a Tokio TCP listener that reports request header blocks.
#[derive(Debug, Default)]
pub struct EmbeddedNode {
    options: NodeOptions,
    bound: Mutex<Option<SocketAddr>>,
}

impl EmbeddedNode {
    pub fn new(options: NodeOptions) -> Self {
        Self {
            options,
            bound: Mutex::new(None),
        }
    }

    /// Address the running instance is bound to (resolves port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_bound(&self, addr: Option<SocketAddr>) {
        *self.bound.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = addr;
    }
}

// SAFETY: `NodeInstance::shutdown` joins the accept loop and waits for every
// connection task, and callbacks only run inside connection tasks.
unsafe impl ForeignNode for EmbeddedNode {
    unsafe fn start(
        &self,
        address: &CStr,
        callback: HeaderCallback,
        user: *mut c_void,
    ) -> *mut c_void {
        match NodeInstance::launch(address, CallbackTarget::new(callback, user), &self.options) {
            Ok(instance) => {
                self.set_bound(Some(instance.local_addr()));
                Box::into_raw(Box::new(instance)).cast()
            }
            Err(e) => {
                tracing::error!(
                    address = %address.to_string_lossy(),
                    error = %e,
                    "Embedded node failed to start"
                );
                ptr::null_mut()
            }
        }
    }

    unsafe fn stop(&self, handle: *mut *mut c_void) {
        if handle.is_null() {
            return;
        }
        let raw = unsafe { std::mem::replace(&mut *handle, ptr::null_mut()) };
        if raw.is_null() {
            return;
        }

        // SAFETY: produced by `Box::into_raw` in `start`; the slot is now null
        // so it cannot be stopped twice through it.
        let instance = unsafe { Box::from_raw(raw.cast::<NodeInstance>()) };
        instance.shutdown();
        self.set_bound(None);
    }
}
