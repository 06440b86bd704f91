//! Console sink: prints every header block to stdout.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{EventFault, EventSink, SinkError};
use crate::bridge::HeaderEvent;

/// Prints `Received headers! <len>` followed by the header text.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    received: AtomicU64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events printed so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl EventSink for ConsoleSink {
    fn on_header(&self, event: HeaderEvent) -> Result<(), SinkError> {
        self.received.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            registration = %event.registration(),
            len = event.len(),
            "Header event received"
        );

        // One locked write so concurrent events do not interleave.
        let mut out = std::io::stdout().lock();
        writeln!(out, "Received headers! {}\n{}\n", event.len(), event.text())
            .and_then(|_| out.flush())
            .map_err(|e| SinkError::Rejected(format!("stdout: {e}")))
    }

    fn on_fault(&self, fault: &EventFault) {
        tracing::warn!(
            registration = %fault.registration(),
            kind = fault.kind(),
            fault = %fault,
            "Header event dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RegistrationId;

    #[test]
    fn counts_printed_events() {
        let sink = ConsoleSink::new();
        assert_eq!(sink.received(), 0);

        sink.on_header(HeaderEvent::new(RegistrationId(7), b"X-Test: 1".to_vec())).unwrap();
        sink.on_header(HeaderEvent::new(RegistrationId(7), Vec::new())).unwrap();
        assert_eq!(sink.received(), 2);
    }
}
