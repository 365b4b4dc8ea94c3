//! Action request types for agent-to-scheduler communication.
//!
//! Host primitives running on an agent's script thread produce
//! [`ActionRequest`] values; the tick scheduler consumes each one exactly
//! once during a drain pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// A world-affecting command an agent can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Step the agent's motor one cell forward.
    #[serde(rename = "move_fw")]
    MoveForward,
}

impl Command {
    /// Return the wire name of the command.
    pub const fn name(self) -> &'static str {
        match self {
            Self::MoveForward => "move_fw",
        }
    }
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A request submitted by an agent's host primitives.
///
/// Requests are immutable once built; the scheduler reads them but never
/// modifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The agent submitting the request.
    pub agent_id: AgentId,
    /// The requested command.
    pub command: Command,
    /// Wall-clock time the request was built.
    pub submitted_at: DateTime<Utc>,
}

impl ActionRequest {
    /// Build a request stamped with the current time.
    pub fn new(agent_id: AgentId, command: Command) -> Self {
        Self {
            agent_id,
            command,
            submitted_at: Utc::now(),
        }
    }
}
