//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, stderr)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - stdout belongs to the console surface, so logs go to stderr
//! - Registration and connection IDs flow through every log line
//! - Metric recording is safe from callback threads

pub mod logging;
pub mod metrics;
