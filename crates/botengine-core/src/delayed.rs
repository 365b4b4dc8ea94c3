//! Delayed action list.
//!
//! Effects scheduled for a future tick wait here until the scheduler's
//! resolve phase. The list is unordered; each tick it is partitioned once
//! into "due" (`target_tick <= tick`) and "not yet due". Due actions are
//! removed as they are handed out, so each fires exactly once and never
//! before its target tick. An action whose target has already passed is
//! still due: it fires on the first tick that sees it.

use botengine_types::{AgentId, RegisterChange};

/// A deferred state change, resolved through the agent registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver a register change to one agent's inbound path.
    SetRegister {
        /// Target agent.
        agent_id: AgentId,
        /// The change to apply.
        change: RegisterChange,
    },
}

impl Effect {
    /// The agent this effect applies to.
    pub const fn agent_id(&self) -> AgentId {
        match self {
            Self::SetRegister { agent_id, .. } => *agent_id,
        }
    }
}

/// An effect scheduled for a specific tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedAction {
    /// First tick on which the effect may fire.
    pub target_tick: u64,
    /// What happens when it fires.
    pub effect: Effect,
}

/// Pending delayed actions.
#[derive(Debug, Default)]
pub struct DelayedActions {
    pending: Vec<DelayedAction>,
}

impl DelayedActions {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Add an action.
    pub fn schedule(&mut self, action: DelayedAction) {
        self.pending.push(action);
    }

    /// Remove and return every action due at `tick`.
    pub fn take_due(&mut self, tick: u64) -> Vec<DelayedAction> {
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|action| action.target_tick <= tick);
        self.pending = later;
        due
    }

    /// Earliest target tick among pending actions.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.iter().map(|action| action.target_tick).min()
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Iterate over pending actions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &DelayedAction> {
        self.pending.iter()
    }
}
