//! Notices an agent runtime sends back to the scheduler.
//!
//! Notices travel on a channel separate from the action queue. They carry
//! script output and lifecycle changes, never world-affecting commands.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// A lifecycle or output notice from one agent's runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentNotice {
    /// The script called `say`.
    Said {
        /// The speaking agent.
        agent_id: AgentId,
        /// The message text.
        message: String,
    },
    /// The script ran to completion or stopped on shutdown.
    Finished {
        /// The agent whose script ended.
        agent_id: AgentId,
    },
    /// The script raised an unrecoverable error.
    Faulted {
        /// The faulted agent.
        agent_id: AgentId,
        /// The error text.
        reason: String,
    },
}

impl AgentNotice {
    /// The agent this notice is about.
    pub const fn agent_id(&self) -> AgentId {
        match self {
            Self::Said { agent_id, .. }
            | Self::Finished { agent_id }
            | Self::Faulted { agent_id, .. } => *agent_id,
        }
    }
}
