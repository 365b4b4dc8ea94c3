//! Agent spawner for populating the registry at startup.
//!
//! Creates `count` agents with ids `0..count` in order, all running the same
//! script, and registers each one at the origin.

use std::sync::Arc;

use botengine_agents::ActionSender;
use botengine_core::{AgentRegistry, AgentsConfig};
use botengine_runner::{AgentSpec, ScriptLimits, spawn_agent};
use botengine_types::{AgentId, AgentNotice};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::EngineError;

/// What every spawned agent shares.
#[derive(Debug, Clone)]
pub struct SpawnPlan {
    /// Number of agents.
    pub count: u32,
    /// Program every agent runs.
    pub script: Arc<str>,
    /// Capacity of each agent's inbound register-change path.
    pub inbound_capacity: usize,
    /// Interpreter limits per agent.
    pub limits: ScriptLimits,
}

impl SpawnPlan {
    /// Build a plan from the agents config section and a loaded script.
    pub fn from_config(config: &AgentsConfig, script: Arc<str>) -> Self {
        Self {
            count: config.count,
            script,
            inbound_capacity: config.inbound_capacity,
            limits: ScriptLimits {
                max_operations: config.max_operations,
            },
        }
    }
}

/// Spawn every agent in `plan` into a fresh registry.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] if the id space is exhausted.
pub fn spawn_agents(
    plan: &SpawnPlan,
    actions: &ActionSender,
    notices: &mpsc::UnboundedSender<AgentNotice>,
    root: &CancellationToken,
) -> Result<AgentRegistry, EngineError> {
    let mut registry = AgentRegistry::new();
    let mut next_id = Some(AgentId::new(0));

    for _ in 0..plan.count {
        let id = next_id.ok_or_else(|| EngineError::Spawner {
            message: format!("cannot assign ids for {} agents", plan.count),
        })?;
        let spec = AgentSpec {
            id,
            script: Arc::clone(&plan.script),
            inbound_capacity: plan.inbound_capacity,
            limits: plan.limits,
        };
        registry.insert(spawn_agent(spec, actions.clone(), notices.clone(), root));
        next_id = id.next();
    }

    info!(agents = registry.len(), "agents spawned");
    Ok(registry)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use botengine_agents::{OverflowPolicy, action_queue};
    use botengine_core::Position;

    use super::*;

    fn plan(count: u32) -> SpawnPlan {
        SpawnPlan::from_config(
            &AgentsConfig {
                count,
                ..AgentsConfig::default()
            },
            Arc::from(""),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawns_sequential_ids_at_origin() {
        let (actions, _receiver) = action_queue(8, OverflowPolicy::Block);
        let (notices, _notice_rx) = mpsc::unbounded_channel();
        let root = CancellationToken::new();

        let registry = spawn_agents(&plan(3), &actions, &notices, &root).unwrap();
        let ids: Vec<u32> = registry.ids().map(AgentId::into_inner).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(
            registry
                .ids()
                .all(|id| registry.position(id) == Some(Position::default()))
        );

        let exits = registry.shutdown_all().await;
        assert_eq!(exits.len(), 3);
    }

    #[tokio::test]
    async fn zero_agents_returns_empty() {
        let (actions, _receiver) = action_queue(8, OverflowPolicy::Block);
        let (notices, _notice_rx) = mpsc::unbounded_channel();
        let registry =
            spawn_agents(&plan(0), &actions, &notices, &CancellationToken::new()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn plan_carries_limits() {
        let config = AgentsConfig {
            max_operations: 500,
            inbound_capacity: 3,
            ..AgentsConfig::default()
        };
        let plan = SpawnPlan::from_config(&config, Arc::from("motor_wait();"));
        assert_eq!(plan.limits.max_operations, 500);
        assert_eq!(plan.inbound_capacity, 3);
        assert_eq!(plan.count, 2);
        assert_eq!(&*plan.script, "motor_wait();");
    }
}
