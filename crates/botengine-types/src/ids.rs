//! Type-safe identifier wrappers.
//!
//! Agents are identified by a small integer assigned in spawn order. The
//! newtype keeps agent identifiers from being mixed with tick numbers or
//! register values at compile time.

use serde::{Deserialize, Serialize};

/// Unique identifier for an agent (bot) in the simulation.
///
/// Identifiers are assigned at creation, starting from 0, and never reused
/// within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl AgentId {
    /// Create an identifier from its raw index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the raw index.
    pub const fn into_inner(self) -> u32 {
        self.0
    }

    /// Return the identifier that follows this one, or `None` on overflow.
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(index) => Some(Self(index)),
            None => None,
        }
    }
}

impl core::fmt::Display for AgentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "bot {}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl From<AgentId> for u32 {
    fn from(id: AgentId) -> Self {
        id.0
    }
}
