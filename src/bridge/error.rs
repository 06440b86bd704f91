//! Error types for the lifecycle and callback bridge.

use thiserror::Error;

use super::context::RegistrationId;

/// Recoverable errors reported to callers of the supervisor API.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The node failed to bind or initialize.
    #[error("node failed to start on {address}: {reason}")]
    Startup { address: String, reason: String },

    /// `start` was called while an instance is live.
    #[error("a node is already running ({registration} on {address})")]
    AlreadyRunning {
        registration: RegistrationId,
        address: String,
    },

    /// `stop` was called with no live instance.
    #[error("no node is running")]
    NotRunning,
}

impl BridgeError {
    pub(crate) fn startup(address: &str, reason: impl Into<String>) -> Self {
        BridgeError::Startup {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// A callback arrived with a context the bridge does not recognise.
///
/// Never returned to a caller: the trampoline logs it and aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityFault {
    #[error("callback delivered a null context pointer")]
    NullContext,

    #[error("callback context {address:#x} is not a live registration")]
    Unregistered { address: usize },

    /// The context at a live address no longer carries the id it was
    /// registered with. This detects in-place corruption only: a stale
    /// callback whose freed address now belongs to a newer registration
    /// resolves to that registration and cannot be told apart.
    #[error("callback context {address:#x} claims {found} but is registered as {registered}")]
    RegistrationMismatch {
        address: usize,
        registered: RegistrationId,
        found: RegistrationId,
    },
}
