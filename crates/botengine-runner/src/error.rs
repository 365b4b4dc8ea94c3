//! Error types for the agent runtime.
//!
//! [`PrimitiveError`] is raised by host primitives and surfaces inside the
//! script as a runtime error. [`AgentError`] is what the runtime reports to
//! the scheduler when a script ends abnormally.

use botengine_types::AgentId;

/// Errors raised by host primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PrimitiveError {
    /// The agent is shutting down; the script must stop.
    #[error("agent shutting down")]
    Cancelled,

    /// The scheduler is gone and can no longer accept requests.
    #[error("action queue closed")]
    QueueClosed,
}

/// Errors that end an agent's runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// The script failed to parse or raised an unrecoverable error.
    #[error("script fault in {agent_id}: {message}")]
    ScriptFault {
        /// The faulted agent.
        agent_id: AgentId,
        /// The interpreter's error text.
        message: String,
    },

    /// The script thread panicked or was aborted.
    #[error("script task for {agent_id} failed: {message}")]
    TaskFailed {
        /// The affected agent.
        agent_id: AgentId,
        /// Description of the join failure.
        message: String,
    },
}
