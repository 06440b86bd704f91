//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → build node backend → Supervisor::start
//!
//! Run (supervisor.rs):
//!     Supervisor::run_until_signaled(trigger) blocks the main thread
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     stdin sentinel / SIGINT / SIGTERM / deadline
//!         → Shutdown coordinator → listener fires
//!         → Supervisor::stop → process exits
//! ```
//!
//! # Design Decisions
//! - The supervisor is synchronous; the node owns every runtime it needs
//! - Triggers are one-shot and consumed by `wait`
//! - Ordered shutdown: foreign stop, then context release

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::{
    Deadline, Shutdown, ShutdownListener, ShutdownTrigger, StdinSentinel, TriggerReason,
};
pub use signals::SignalTrigger;
pub use supervisor::{RunningInstance, Supervisor, SupervisorState};
