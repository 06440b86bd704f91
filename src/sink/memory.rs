//! In-memory sink that records every event.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{EventFault, EventSink, SinkError};
use crate::bridge::HeaderEvent;

#[derive(Default)]
struct Recorded {
    events: Vec<HeaderEvent>,
    faults: Vec<&'static str>,
}

/// Records events in arrival order and fault kinds as they are reported.
#[derive(Default)]
pub struct MemorySink {
    recorded: Mutex<Recorded>,
    changed: Condvar,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events received so far.
    pub fn count(&self) -> usize {
        self.lock().events.len()
    }

    /// Snapshot of all events received so far.
    pub fn events(&self) -> Vec<HeaderEvent> {
        self.lock().events.clone()
    }

    /// Kinds of all faults reported so far, in order.
    pub fn fault_kinds(&self) -> Vec<&'static str> {
        self.lock().faults.clone()
    }

    /// Block until at least `count` events arrived. Returns `false` on timeout.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut recorded = self.lock();
        while recorded.events.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            recorded = match self.changed.wait_timeout(recorded, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        // A panicking reader must not take recording down with it.
        self.recorded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for MemorySink {
    fn on_header(&self, event: HeaderEvent) -> Result<(), SinkError> {
        self.lock().events.push(event);
        self.changed.notify_all();
        Ok(())
    }

    fn on_fault(&self, fault: &EventFault) {
        self.lock().faults.push(fault.kind());
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RegistrationId;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn records_in_order() {
        let sink = MemorySink::new();
        sink.on_header(HeaderEvent::new(RegistrationId(1), b"A: 1".to_vec())).unwrap();
        sink.on_header(HeaderEvent::new(RegistrationId(1), b"B: 2".to_vec())).unwrap();

        let events = sink.events();
        assert_eq!(events[0].bytes(), b"A: 1");
        assert_eq!(events[1].bytes(), b"B: 2");
    }

    #[test]
    fn wait_for_wakes_on_delivery() {
        let sink = Arc::new(MemorySink::new());
        let producer = sink.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer
                .on_header(HeaderEvent::new(RegistrationId(2), b"X: y".to_vec()))
                .unwrap();
        });

        assert!(sink.wait_for(1, Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_for_times_out() {
        let sink = MemorySink::new();
        assert!(!sink.wait_for(1, Duration::from_millis(10)));
    }
}
