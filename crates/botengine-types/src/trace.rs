//! Trace notifications emitted by the scheduler and agents.
//!
//! The [`Display`](core::fmt::Display) output of each event is the exact
//! free-text line shown to observers.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// An observable notification from the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A tick fired and processing began.
    GameTick {
        /// The tick being processed.
        tick: u64,
    },
    /// An agent's forward step was accepted.
    AgentMoved {
        /// The tick in which the move was processed.
        tick: u64,
        /// The agent that moved.
        agent_id: AgentId,
    },
    /// All work for the tick is finished.
    DoneProcessing {
        /// The tick that finished.
        tick: u64,
    },
    /// An agent's script called `say`.
    AgentSaid {
        /// The speaking agent.
        agent_id: AgentId,
        /// What was said.
        message: String,
    },
    /// An agent stopped because of a fault.
    AgentFaulted {
        /// The faulted agent.
        agent_id: AgentId,
        /// Human-readable cause.
        reason: String,
    },
}

impl core::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GameTick { .. } => f.write_str("game tick"),
            Self::AgentMoved { agent_id, .. } => write!(f, "{agent_id} has moved forward"),
            Self::DoneProcessing { .. } => f.write_str("done processing"),
            Self::AgentSaid { agent_id, message } => write!(f, "{agent_id} says: {message}"),
            Self::AgentFaulted { agent_id, reason } => write!(f, "{agent_id} faulted: {reason}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tick_lines_match_observer_text() {
        assert_eq!(TraceEvent::GameTick { tick: 4 }.to_string(), "game tick");
        assert_eq!(
            TraceEvent::DoneProcessing { tick: 4 }.to_string(),
            "done processing"
        );
        let moved = TraceEvent::AgentMoved {
            tick: 0,
            agent_id: AgentId::new(1),
        };
        assert_eq!(moved.to_string(), "bot 1 has moved forward");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(TraceEvent::GameTick { tick: 2 }).unwrap();
        assert_eq!(json["kind"], "game_tick");
        assert_eq!(json["tick"], 2);
    }
}
