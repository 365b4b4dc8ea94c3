//! Trace sinks.
//!
//! The scheduler reports everything observable through a [`TraceSink`].
//! Sinks are called synchronously from the scheduler task and must not
//! block.

use botengine_types::TraceEvent;
use tokio::sync::mpsc;
use tracing::info;

/// Receiver of trace events, invoked in emission order.
pub trait TraceSink: Send {
    /// Record one event.
    fn emit(&mut self, event: &TraceEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl TraceSink for NoOpSink {
    fn emit(&mut self, _event: &TraceEvent) {}
}

/// Logs every event through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn emit(&mut self, event: &TraceEvent) {
        info!(target: "botengine::trace", event = ?event, "{event}");
    }
}

/// Prints the plain trace text, one line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl TraceSink for StdoutSink {
    fn emit(&mut self, event: &TraceEvent) {
        println!("{event}");
    }
}

/// Forwards events to an unbounded channel.
///
/// Once the receiver is dropped, events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TraceEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TraceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TraceSink for ChannelSink {
    fn emit(&mut self, event: &TraceEvent) {
        let _ = self.tx.send(event.clone());
    }
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn emit(&mut self, event: &TraceEvent) {
        (**self).emit(event);
    }
}
