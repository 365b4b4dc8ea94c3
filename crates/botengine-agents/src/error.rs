//! Error types for the botengine-agents crate.
//!
//! Register access itself cannot fail; the errors here come from the
//! suspension points around it (waiting on a register, handing a request
//! to the action queue).

/// Errors from waiting on an agent's registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// The shutdown signal fired before the awaited value was reached.
    #[error("register wait cancelled by shutdown")]
    Cancelled,
}

/// Errors from submitting an action request to the shared queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue is at capacity and the overflow policy rejects the send.
    ///
    /// This is retryable: the request was not enqueued and nothing was lost.
    #[error("action queue full (capacity {capacity})")]
    Overflow {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The scheduler side of the queue has been dropped.
    #[error("action queue closed")]
    Closed,

    /// The shutdown signal fired while waiting for queue space.
    #[error("action submit cancelled by shutdown")]
    Cancelled,
}

impl QueueError {
    /// Whether the caller may retry the same request later.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Overflow { .. })
    }
}
