//! Header bridge: supervise a foreign header-parsing node and bridge its
//! callbacks back into Rust.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────── supervisor thread ────────────────────────┐
//!   │  Supervisor::start ──▶ Registration (context) ──▶ ForeignNode::start
//!   │  Supervisor::run_until_signaled ◀── ShutdownTrigger (stdin, signal)
//!   │  Supervisor::stop ──▶ ForeignNode::stop ──▶ release context       │
//!   └───────────────────────────────────────────────────────────────────┘
//!                     │ handle + context address
//!                     ▼
//!   ┌──────────────────────── node threads (not ours) ──────────────────┐
//!   │  header parsed ──▶ header_trampoline(ctx, ptr, len)               │
//!   │                      ├─ validate ctx against live registrations  │
//!   │                      ├─ copy bytes                               │
//!   │                      └─ EventSink::on_header / on_fault          │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod lifecycle;
pub mod node;
pub mod observability;
pub mod sink;

pub use bridge::{BridgeError, ForeignNode, HeaderCallback, HeaderEvent, RegistrationId};
pub use config::BridgeConfig;
pub use lifecycle::{ShutdownTrigger, Supervisor, SupervisorState, TriggerReason};
pub use sink::EventSink;
