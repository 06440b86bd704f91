//! Shutdown triggers and the coordinator that fans them in.

use std::fmt;
use std::io::{BufRead, BufReader, Stdin};
use std::thread;
use std::time::Duration;

use tokio::sync::broadcast;

/// Why a trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The sentinel line was read.
    Sentinel,
    /// Input reached end of file.
    EndOfInput,
    /// An OS signal arrived.
    Signal,
    /// A fixed deadline elapsed.
    Deadline,
    /// Shutdown was requested programmatically.
    Requested,
    /// Every source feeding the coordinator went away without firing.
    SourcesClosed,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerReason::Sentinel => "sentinel",
            TriggerReason::EndOfInput => "end-of-input",
            TriggerReason::Signal => "signal",
            TriggerReason::Deadline => "deadline",
            TriggerReason::Requested => "requested",
            TriggerReason::SourcesClosed => "sources-closed",
        };
        f.write_str(s)
    }
}

/// A one-shot, blocking source of the stop condition.
///
/// `wait` consumes the trigger: it fires once and cannot be reused.
pub trait ShutdownTrigger {
    fn wait(self) -> TriggerReason;
}

/// Coordinator for graceful shutdown.
///
/// Any number of trigger sources can be forwarded into it; listeners fire on
/// the first one.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<TriggerReason>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    ///
    /// Only triggers fired after subscribing are observed.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self, reason: TriggerReason) {
        let _ = self.tx.send(reason);
    }

    /// Get the number of active listeners.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Run `source` on a background thread and trigger when it fires.
    ///
    /// The thread holds a sender clone, so the coordinator stays open while
    /// any forwarded source is still waiting.
    pub fn forward<T>(&self, source: T) -> thread::JoinHandle<()>
    where
        T: ShutdownTrigger + Send + 'static,
    {
        let shutdown = self.clone();
        thread::spawn(move || {
            let reason = source.wait();
            tracing::debug!(reason = %reason, "Shutdown source fired");
            shutdown.trigger(reason);
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`Shutdown`] coordinator.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: broadcast::Receiver<TriggerReason>,
}

impl ShutdownTrigger for ShutdownListener {
    fn wait(mut self) -> TriggerReason {
        loop {
            match self.rx.blocking_recv() {
                Ok(reason) => return reason,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("All shutdown sources closed without firing");
                    return TriggerReason::SourcesClosed;
                }
            }
        }
    }
}

/// Fires when a line equal to the sentinel is read.
///
/// Lines are compared with surrounding whitespace trimmed. End of input (or a
/// read error) fires too unless `stop_on_eof` is disabled, in which case the
/// trigger parks its thread forever.
pub struct StdinSentinel<R> {
    reader: R,
    sentinel: String,
    stop_on_eof: bool,
}

impl<R: BufRead> StdinSentinel<R> {
    /// Surrounding whitespace in `sentinel` is ignored, as it is in input lines.
    pub fn new(reader: R, sentinel: impl Into<String>) -> Self {
        Self {
            reader,
            sentinel: sentinel.into().trim().to_string(),
            stop_on_eof: true,
        }
    }

    pub fn stop_on_eof(mut self, enabled: bool) -> Self {
        self.stop_on_eof = enabled;
        self
    }
}

impl StdinSentinel<BufReader<Stdin>> {
    /// Sentinel reader over the process's standard input.
    pub fn stdin(sentinel: impl Into<String>) -> Self {
        Self::new(BufReader::new(std::io::stdin()), sentinel)
    }
}

impl<R: BufRead> ShutdownTrigger for StdinSentinel<R> {
    fn wait(mut self) -> TriggerReason {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) if line.trim() == self.sentinel => return TriggerReason::Sentinel,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read console input");
                    break;
                }
            }
        }

        if !self.stop_on_eof {
            tracing::debug!("Console input closed; waiting for other shutdown sources");
            loop {
                thread::park();
            }
        }
        TriggerReason::EndOfInput
    }
}

/// Fires once a fixed duration has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(pub Duration);

impl ShutdownTrigger for Deadline {
    fn wait(self) -> TriggerReason {
        thread::sleep(self.0);
        TriggerReason::Deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Instant;

    #[test]
    fn sentinel_fires_on_matching_line() {
        let input = Cursor::new("hello\n  q  \nignored\n");
        assert_eq!(StdinSentinel::new(input, "q").wait(), TriggerReason::Sentinel);
    }

    #[test]
    fn padded_sentinel_still_fires() {
        let input = Cursor::new("q\n");
        assert_eq!(StdinSentinel::new(input, " q\t").wait(), TriggerReason::Sentinel);
    }

    #[test]
    fn sentinel_ignores_prefix_matches() {
        let input = Cursor::new("quit\nqq\n");
        assert_eq!(StdinSentinel::new(input, "q").wait(), TriggerReason::EndOfInput);
    }

    #[test]
    fn deadline_waits() {
        let started = Instant::now();
        assert_eq!(Deadline(Duration::from_millis(30)).wait(), TriggerReason::Deadline);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn listener_fires_on_first_source() {
        let shutdown = Shutdown::new();
        let listener = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);

        shutdown.forward(Deadline(Duration::from_millis(10)));
        shutdown.forward(Deadline(Duration::from_secs(30)));

        assert_eq!(listener.wait(), TriggerReason::Deadline);
    }

    #[test]
    fn listener_reports_closed_sources() {
        let shutdown = Shutdown::new();
        let listener = shutdown.subscribe();
        drop(shutdown);

        assert_eq!(listener.wait(), TriggerReason::SourcesClosed);
    }

    #[test]
    fn programmatic_trigger() {
        let shutdown = Shutdown::new();
        let listener = shutdown.subscribe();
        shutdown.trigger(TriggerReason::Requested);
        assert_eq!(listener.wait(), TriggerReason::Requested);
    }
}
