//! Event sinks: the supervisor-side consumers of header events.
//!
//! # Data Flow
//! ```text
//! trampoline (node thread)
//!     → EventSink::on_header(HeaderEvent)     normal path
//!     → EventSink::on_fault(&EventFault)      side error channel
//!
//! console.rs  print and count (process default)
//! memory.rs   record in arrival order
//! channel.rs  queue to another execution context
//! ```
//!
//! # Design Decisions
//! - Sinks are `Send + Sync`: they are called concurrently from foreign threads
//! - No ordering between events is assumed
//! - `on_header` must return promptly; heavy work belongs behind a channel

pub mod channel;
pub mod console;
pub mod memory;

pub use channel::ChannelSink;
pub use console::ConsoleSink;
pub use memory::MemorySink;

use thiserror::Error;

use crate::bridge::{HeaderEvent, RegistrationId};

/// Consumer of decoded header events.
pub trait EventSink: Send + Sync {
    /// Handle one event. Called from node threads, possibly concurrently.
    fn on_header(&self, event: HeaderEvent) -> Result<(), SinkError>;

    /// Error path for events that could not be delivered or processed.
    fn on_fault(&self, fault: &EventFault) {
        tracing::warn!(fault = %fault, "Header event dropped");
    }
}

/// Errors a sink reports from `on_header`.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event channel closed")]
    Closed,

    #[error("event rejected: {0}")]
    Rejected(String),
}

/// A fault caught at the callback boundary.
#[derive(Debug, Error)]
pub enum EventFault {
    #[error("{registration}: null payload pointer with length {len}")]
    NullPayload {
        registration: RegistrationId,
        len: usize,
    },

    #[error("{registration}: sink failed: {source}")]
    Sink {
        registration: RegistrationId,
        #[source]
        source: SinkError,
    },

    #[error("{registration}: sink panicked: {message}")]
    Panicked {
        registration: RegistrationId,
        message: String,
    },
}

impl EventFault {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EventFault::NullPayload { .. } => "null_payload",
            EventFault::Sink { .. } => "sink",
            EventFault::Panicked { .. } => "panicked",
        }
    }

    pub fn registration(&self) -> RegistrationId {
        match self {
            EventFault::NullPayload { registration, .. }
            | EventFault::Sink { registration, .. }
            | EventFault::Panicked { registration, .. } => *registration,
        }
    }
}
