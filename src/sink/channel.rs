//! Channel sink: hands events to another execution context.
//!
//! The callback only pays for a channel send; whoever owns the receiver does
//! the actual processing, on a Tokio task or a plain thread.

use tokio::sync::mpsc;

use super::{EventSink, SinkError};
use crate::bridge::HeaderEvent;

/// Forwards every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<HeaderEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HeaderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_header(&self, event: HeaderEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Closed)
    }
}
