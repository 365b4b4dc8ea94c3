//! Agent registry: the scheduler's only path to running agents.
//!
//! Maps [`AgentId`] to the agent's handle, its world position and its
//! lifecycle status. Delayed effects carry only an id and are resolved here
//! at fire time.

use std::collections::BTreeMap;
use std::time::Duration;

use botengine_runner::{AgentExit, AgentHandle};
use botengine_types::{AgentId, RegisterChange};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors delivering a register change to an agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// No agent with this id is registered.
    #[error("{agent_id} is not registered")]
    UnknownAgent {
        /// The missing agent.
        agent_id: AgentId,
    },

    /// The agent's inbound path is closed (agent stopped).
    #[error("{agent_id} inbound path closed")]
    Closed {
        /// The stopped agent.
        agent_id: AgentId,
    },

    /// Every bounded hand-off attempt timed out.
    #[error("{agent_id} listener unresponsive after {attempts} attempts")]
    ListenerUnresponsive {
        /// The unresponsive agent.
        agent_id: AgentId,
        /// How many attempts were made.
        attempts: u32,
    },
}

/// Bounded hand-off parameters for effect delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffPolicy {
    /// Time allowed for one send attempt.
    pub timeout: Duration,
    /// Attempts before the listener is declared unresponsive (at least 1).
    pub attempts: u32,
}

/// Integer world position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: i64,
    /// Vertical coordinate; forward movement increases it.
    pub y: i64,
}

/// Lifecycle status of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// Script is running (or blocked in a primitive).
    Running,
    /// Script returned normally.
    Finished,
    /// Script faulted or the listener stopped responding.
    Faulted {
        /// Human-readable cause.
        reason: String,
    },
}

/// Send `change` on `inbound`, each attempt bounded by `policy.timeout`.
async fn hand_off(
    inbound: &mpsc::Sender<RegisterChange>,
    id: AgentId,
    change: RegisterChange,
    policy: HandoffPolicy,
) -> Result<(), DeliveryError> {
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, inbound.send(change.clone())).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(_)) => return Err(DeliveryError::Closed { agent_id: id }),
            Err(_elapsed) => {
                debug!(agent_id = %id, attempt, attempts, "register hand-off timed out");
            }
        }
    }

    Err(DeliveryError::ListenerUnresponsive {
        agent_id: id,
        attempts,
    })
}

/// One registry entry.
#[derive(Debug)]
pub struct AgentEntry {
    handle: AgentHandle,
    position: Position,
    status: AgentStatus,
}

impl AgentEntry {
    /// The agent's handle.
    pub const fn handle(&self) -> &AgentHandle {
        &self.handle
    }

    /// Current position.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Current status.
    pub const fn status(&self) -> &AgentStatus {
        &self.status
    }
}

/// All agents known to the scheduler, keyed by id.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, AgentEntry>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
        }
    }

    /// Register a spawned agent at the origin. Replaces (and returns) any
    /// previous handle with the same id.
    pub fn insert(&mut self, handle: AgentHandle) -> Option<AgentHandle> {
        let id = handle.id();
        let entry = AgentEntry {
            handle,
            position: Position::default(),
            status: AgentStatus::Running,
        };
        self.agents.insert(id, entry).map(|old| old.handle)
    }

    /// Look up an agent.
    pub fn get(&self, id: AgentId) -> Option<&AgentEntry> {
        self.agents.get(&id)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of agents currently faulted.
    pub fn faulted_count(&self) -> usize {
        self.agents
            .values()
            .filter(|entry| matches!(entry.status, AgentStatus::Faulted { .. }))
            .count()
    }

    /// Position of an agent.
    pub fn position(&self, id: AgentId) -> Option<Position> {
        self.agents.get(&id).map(|entry| entry.position)
    }

    /// Status of an agent.
    pub fn status(&self, id: AgentId) -> Option<&AgentStatus> {
        self.agents.get(&id).map(|entry| &entry.status)
    }

    /// Move an agent one step forward. Returns the new position, or `None`
    /// for an unknown agent.
    pub fn move_forward(&mut self, id: AgentId) -> Option<Position> {
        let entry = self.agents.get_mut(&id)?;
        entry.position.y = entry.position.y.saturating_add(1);
        Some(entry.position)
    }

    /// Mark an agent faulted. Returns `false` if it was already faulted or
    /// is unknown.
    pub fn mark_faulted(&mut self, id: AgentId, reason: impl Into<String>) -> bool {
        match self.agents.get_mut(&id) {
            Some(entry) if !matches!(entry.status, AgentStatus::Faulted { .. }) => {
                entry.status = AgentStatus::Faulted {
                    reason: reason.into(),
                };
                true
            }
            _ => false,
        }
    }

    /// Mark an agent's script as finished. A faulted agent stays faulted.
    pub fn mark_finished(&mut self, id: AgentId) {
        if let Some(entry) = self.agents.get_mut(&id) {
            if entry.status == AgentStatus::Running {
                entry.status = AgentStatus::Finished;
            }
        }
    }

    /// Hand a register change to an agent's listener with bounded retries.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::UnknownAgent`] if `id` is not registered.
    /// - [`DeliveryError::Closed`] if the agent's listener has stopped.
    /// - [`DeliveryError::ListenerUnresponsive`] if every attempt timed out.
    pub async fn deliver(
        &self,
        id: AgentId,
        change: RegisterChange,
        policy: HandoffPolicy,
    ) -> Result<(), DeliveryError> {
        let entry = self
            .agents
            .get(&id)
            .ok_or(DeliveryError::UnknownAgent { agent_id: id })?;
        hand_off(entry.handle.inbound(), id, change, policy).await
    }

    /// Cancel every agent and wait for all of them to stop.
    pub async fn shutdown_all(self) -> Vec<AgentExit> {
        for entry in self.agents.values() {
            entry.handle.cancel();
        }

        let mut exits = Vec::with_capacity(self.agents.len());
        for (id, entry) in self.agents {
            let exit = entry.handle.shutdown().await;
            match &exit.script {
                Ok(outcome) => debug!(agent_id = %id, outcome = ?outcome, "agent stopped"),
                Err(err) => warn!(agent_id = %id, error = %err, "agent stopped with fault"),
            }
            exits.push(exit);
        }
        info!(agents = exits.len(), "all agents stopped");
        exits
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use botengine_agents::{OverflowPolicy, action_queue};
    use botengine_runner::{AgentSpec, ScriptLimits, spawn_agent};
    use botengine_types::MOTOR_READY;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn handle(id: u32, script: &str, root: &CancellationToken) -> AgentHandle {
        let (actions, _receiver) = action_queue(8, OverflowPolicy::Block);
        let (notices, _notice_rx) = mpsc::unbounded_channel();
        spawn_agent(
            AgentSpec {
                id: AgentId::new(id),
                script: Arc::from(script),
                inbound_capacity: 1,
                limits: ScriptLimits::default(),
            },
            actions,
            notices,
            root,
        )
    }

    const POLICY: HandoffPolicy = HandoffPolicy {
        timeout: Duration::from_millis(20),
        attempts: 3,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn forward_movement_and_status() {
        let root = CancellationToken::new();
        let mut registry = AgentRegistry::new();
        assert!(registry.insert(handle(0, "", &root)).is_none());
        assert!(registry.insert(handle(1, "", &root)).is_none());

        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![AgentId::new(0), AgentId::new(1)]);
        assert_eq!(registry.move_forward(AgentId::new(1)), Some(Position { x: 0, y: 1 }));
        assert_eq!(registry.move_forward(AgentId::new(1)), Some(Position { x: 0, y: 2 }));
        assert_eq!(registry.position(AgentId::new(0)), Some(Position::default()));
        assert_eq!(registry.move_forward(AgentId::new(7)), None);

        assert!(registry.mark_faulted(AgentId::new(0), "boom"));
        assert!(!registry.mark_faulted(AgentId::new(0), "again"));
        registry.mark_finished(AgentId::new(0));
        assert!(matches!(
            registry.status(AgentId::new(0)),
            Some(AgentStatus::Faulted { .. })
        ));
        registry.mark_finished(AgentId::new(1));
        assert_eq!(registry.status(AgentId::new(1)), Some(&AgentStatus::Finished));
        assert_eq!(registry.faulted_count(), 1);

        let exits = registry.shutdown_all().await;
        assert_eq!(exits.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn deliver_applies_change() {
        let root = CancellationToken::new();
        let mut registry = AgentRegistry::new();
        let agent = handle(3, "", &root);
        let registers = agent.registers();
        registers.set(MOTOR_READY, 1);
        registry.insert(agent);

        registry
            .deliver(AgentId::new(3), RegisterChange::motor_ready_reset(), POLICY)
            .await
            .unwrap();
        registers
            .wait_for(MOTOR_READY, 0, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(registers.get(MOTOR_READY), 0);

        registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn deliver_to_unknown_agent_fails() {
        let registry = AgentRegistry::new();
        let result = registry
            .deliver(AgentId::new(9), RegisterChange::motor_ready_reset(), POLICY)
            .await;
        assert_eq!(
            result,
            Err(DeliveryError::UnknownAgent {
                agent_id: AgentId::new(9)
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_inbound_is_unresponsive_after_bounded_retries() {
        let (inbound, _rx) = mpsc::channel(1);
        hand_off(&inbound, AgentId::new(2), RegisterChange::motor_ready_reset(), POLICY)
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let result = hand_off(&inbound, AgentId::new(2), RegisterChange::motor_ready_reset(), POLICY).await;
        assert_eq!(
            result,
            Err(DeliveryError::ListenerUnresponsive {
                agent_id: AgentId::new(2),
                attempts: 3
            })
        );
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let (inbound, mut rx) = mpsc::channel(1);
        let policy = HandoffPolicy {
            timeout: Duration::from_millis(5),
            attempts: 0,
        };
        hand_off(&inbound, AgentId::new(1), RegisterChange::motor_ready_reset(), policy)
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(RegisterChange::motor_ready_reset()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn deliver_to_stopped_agent_reports_closed() {
        let root = CancellationToken::new();
        let mut registry = AgentRegistry::new();
        let agent = handle(5, "", &root);
        agent.cancel();
        // Give the listener time to observe shutdown and drop its receiver.
        tokio::time::timeout(Duration::from_secs(1), agent.inbound().closed())
            .await
            .unwrap();
        registry.insert(agent);

        let result = registry
            .deliver(AgentId::new(5), RegisterChange::motor_ready_reset(), POLICY)
            .await;
        assert_eq!(
            result,
            Err(DeliveryError::Closed {
                agent_id: AgentId::new(5)
            })
        );
        registry.shutdown_all().await;
    }
}
