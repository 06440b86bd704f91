//! Lifecycle supervisor for one foreign node.
//!
//! # State Machine
//! ```text
//! Idle → Starting → Running → Stopping → Idle
//!           │
//!           └── start failed ──→ Idle
//! ```
//!
//! # Design Decisions
//! - At most one live handle per supervisor
//! - The user context is released only after the foreign stop has returned
//! - `stop` on an idle supervisor is an error, not a silent no-op
//! - Dropping a running supervisor stops the node first

use std::ffi::CString;
use std::fmt;
use std::sync::Arc;

use crate::bridge::boundary::stop_handle;
use crate::bridge::context::Registration;
use crate::bridge::trampoline::header_trampoline;
use crate::bridge::{BridgeError, ForeignNode, NodeHandle, RegistrationId};
use crate::lifecycle::shutdown::{ShutdownTrigger, TriggerReason};
use crate::observability::metrics;
use crate::sink::EventSink;

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No node instance exists.
    Idle,
    /// The foreign start call is in progress.
    Starting,
    /// A node instance is live; callbacks may arrive at any time.
    Running,
    /// The foreign stop call is in progress; callbacks may still arrive.
    Stopping,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of the live instance returned by [`Supervisor::start`].
///
/// The handle itself never leaves the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningInstance {
    pub registration: RegistrationId,
    pub address: String,
}

struct ActiveNode {
    handle: NodeHandle,
    registration: Registration,
    instance: RunningInstance,
}

/// Starts, runs and stops a foreign node, owning its handle and context.
pub struct Supervisor<N: ForeignNode> {
    node: N,
    state: SupervisorState,
    active: Option<ActiveNode>,
}

impl<N: ForeignNode> Supervisor<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            state: SupervisorState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// The live instance, if any.
    pub fn instance(&self) -> Option<&RunningInstance> {
        self.active.as_ref().map(|active| &active.instance)
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Start the node on `address`, delivering its header events to `sink`.
    pub fn start(
        &mut self,
        address: &str,
        sink: Arc<dyn EventSink>,
    ) -> Result<RunningInstance, BridgeError> {
        if let Some(active) = &self.active {
            tracing::warn!(
                registration = %active.instance.registration,
                address = %active.instance.address,
                "Start requested while a node is running"
            );
            return Err(BridgeError::AlreadyRunning {
                registration: active.instance.registration,
                address: active.instance.address.clone(),
            });
        }

        let c_address = CString::new(address)
            .map_err(|_| BridgeError::startup(address, "address contains a NUL byte"))?;

        self.transition(SupervisorState::Starting);
        let registration = Registration::new(sink);

        // SAFETY: the registration outlives the node: it is only dropped after
        // `stop` returns, or right here if start failed.
        let raw = unsafe {
            self.node
                .start(&c_address, header_trampoline, registration.user_ptr())
        };

        let Some(handle) = NodeHandle::from_raw(raw) else {
            tracing::error!(
                address = %address,
                registration = %registration.id(),
                "Node failed to start"
            );
            drop(registration);
            self.transition(SupervisorState::Idle);
            return Err(BridgeError::startup(address, "node returned a null handle"));
        };

        let instance = RunningInstance {
            registration: registration.id(),
            address: address.to_string(),
        };
        tracing::info!(
            address = %address,
            registration = %instance.registration,
            handle = ?handle.as_ptr(),
            "Node running"
        );

        self.active = Some(ActiveNode {
            handle,
            registration,
            instance: instance.clone(),
        });
        self.transition(SupervisorState::Running);
        Ok(instance)
    }

    /// Block the calling thread until `trigger` fires.
    pub fn run_until_signaled<T: ShutdownTrigger>(&self, trigger: T) -> TriggerReason {
        tracing::info!(state = %self.state, "Waiting for shutdown trigger");
        let reason = trigger.wait();
        tracing::info!(reason = %reason, "Shutdown triggered");
        reason
    }

    /// Stop the live node and release its context.
    ///
    /// Returns once the node has confirmed no further callbacks and every
    /// callback already in flight has finished.
    pub fn stop(&mut self) -> Result<(), BridgeError> {
        let Some(ActiveNode {
            handle,
            registration,
            instance,
        }) = self.active.take()
        else {
            tracing::debug!("Stop requested with no running node");
            return Err(BridgeError::NotRunning);
        };

        self.transition(SupervisorState::Stopping);
        tracing::info!(
            address = %instance.address,
            registration = %instance.registration,
            "Stopping node"
        );

        // SAFETY: `handle` came from `start` on this node and is stopped once.
        let cleared = unsafe { stop_handle(&self.node, handle) };
        if !cleared {
            tracing::debug!(registration = %instance.registration, "Node left its handle slot set");
        }

        // Deregistration waits for any dispatch that is still running.
        drop(registration);

        self.transition(SupervisorState::Idle);
        tracing::info!(registration = %instance.registration, "Node stopped");
        Ok(())
    }

    fn transition(&mut self, next: SupervisorState) {
        tracing::debug!(from = %self.state, to = %next, "Supervisor state change");
        self.state = next;
        metrics::record_transition(next.as_str());
    }
}

impl<N: ForeignNode> Drop for Supervisor<N> {
    fn drop(&mut self) {
        if self.active.is_some() {
            tracing::warn!("Supervisor dropped while running; stopping node");
            let _ = self.stop();
        }
    }
}
