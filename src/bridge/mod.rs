//! Callback bridge between a foreign node and the supervisor.
//!
//! # Data Flow
//! ```text
//! Supervisor::start
//!     → context.rs (allocate CallbackContext, register its address)
//!     → boundary.rs (ForeignNode::start with trampoline + context address)
//!
//! Node worker thread (not ours)
//!     → trampoline.rs (validate context, copy bytes, catch panics)
//!     → event.rs (owned HeaderEvent)
//!     → EventSink::on_header / EventSink::on_fault
//!
//! Supervisor::stop
//!     → ForeignNode::stop (node-side barrier)
//!     → context.rs (deregister: waits for in-flight dispatch, then free)
//! ```
//!
//! # Design Decisions
//! - One fixed `extern "C"` entry point; per-instance state only via the context pointer
//! - Context is immutable after construction, so dispatch takes no locks on it
//! - Unknown context addresses abort the process instead of being dereferenced

pub mod boundary;
pub mod context;
pub mod error;
pub mod event;
pub mod trampoline;

pub use boundary::{ForeignNode, HeaderCallback, NodeHandle};
pub use context::RegistrationId;
pub use error::{BridgeError, IntegrityFault};
pub use event::HeaderEvent;
