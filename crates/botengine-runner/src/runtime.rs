//! Agent runtime: spawning and stopping one scripted agent.
//!
//! Every agent gets two concurrent units:
//!
//! 1. A register-update listener (async task) applying inbound changes.
//! 2. A script thread ([`tokio::task::spawn_blocking`]) running the program
//!    with host primitives bound.
//!
//! Both observe a child of the caller's shutdown token. A script fault ends
//! only that agent's script thread: it is logged, reported on the notice
//! channel, and returned from [`AgentHandle::shutdown`]. The listener keeps
//! running so late register changes are still absorbed.

use std::sync::Arc;

use botengine_agents::{ActionSender, ListenerReport, RegisterStore, inbound_channel, run_listener};
use botengine_types::{AgentId, AgentNotice, RegisterChange};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::AgentError;
use crate::primitives::HostContext;
use crate::script::{ScriptLimits, ScriptOutcome, run_script};

/// What is needed to start one agent.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Identity assigned at creation.
    pub id: AgentId,
    /// Program source text.
    pub script: Arc<str>,
    /// Capacity of the agent's inbound register-change path.
    pub inbound_capacity: usize,
    /// Interpreter limits.
    pub limits: ScriptLimits,
}

/// Final report of a stopped agent.
#[derive(Debug)]
pub struct AgentExit {
    /// The agent that stopped.
    pub agent_id: AgentId,
    /// How the script ended.
    pub script: Result<ScriptOutcome, AgentError>,
    /// Listener report, or `None` if the listener task failed to join.
    pub listener: Option<ListenerReport>,
}

/// Owning handle to a running agent.
///
/// The handle is the only way to reach an agent from outside: the inbound
/// sender for register changes and the shutdown control.
#[derive(Debug)]
pub struct AgentHandle {
    id: AgentId,
    registers: Arc<RegisterStore>,
    inbound: mpsc::Sender<RegisterChange>,
    shutdown: CancellationToken,
    script_task: JoinHandle<Result<ScriptOutcome, AgentError>>,
    listener_task: JoinHandle<ListenerReport>,
}

impl AgentHandle {
    /// The agent's identity.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Sender for the agent's inbound register-change path.
    pub const fn inbound(&self) -> &mpsc::Sender<RegisterChange> {
        &self.inbound
    }

    /// Read-only view of the agent's registers, for observers and tests.
    pub fn registers(&self) -> Arc<RegisterStore> {
        Arc::clone(&self.registers)
    }

    /// Whether the script thread has ended (completed, faulted or stopped).
    pub fn script_finished(&self) -> bool {
        self.script_task.is_finished()
    }

    /// Signal shutdown without waiting.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Signal shutdown and wait for both units to stop.
    pub async fn shutdown(self) -> AgentExit {
        self.shutdown.cancel();

        let script = match self.script_task.await {
            Ok(result) => result,
            Err(join_err) => Err(AgentError::TaskFailed {
                agent_id: self.id,
                message: join_err.to_string(),
            }),
        };
        let listener = match self.listener_task.await {
            Ok(report) => Some(report),
            Err(join_err) => {
                warn!(agent_id = %self.id, error = %join_err, "listener task failed");
                None
            }
        };

        AgentExit {
            agent_id: self.id,
            script,
            listener,
        }
    }
}

/// Spawn an agent's listener and script thread on the current runtime.
///
/// Must be called from within a tokio runtime.
pub fn spawn_agent(
    spec: AgentSpec,
    actions: ActionSender,
    notices: mpsc::UnboundedSender<AgentNotice>,
    parent: &CancellationToken,
) -> AgentHandle {
    let shutdown = parent.child_token();
    let registers = Arc::new(RegisterStore::new());
    let (inbound, inbound_rx) = inbound_channel(spec.inbound_capacity);

    let listener_task = tokio::spawn(run_listener(
        spec.id,
        Arc::clone(&registers),
        inbound_rx,
        shutdown.clone(),
    ));

    let ctx = HostContext::new(
        spec.id,
        Arc::clone(&registers),
        actions,
        notices.clone(),
        shutdown.clone(),
        Handle::current(),
    );
    let source = Arc::clone(&spec.script);
    let limits = spec.limits;
    let agent_id = spec.id;

    let script_task = tokio::task::spawn_blocking(move || {
        let result = run_script(&ctx, &source, limits);
        let notice = match &result {
            Ok(outcome) => {
                info!(agent_id = %agent_id, outcome = ?outcome, "script ended");
                AgentNotice::Finished { agent_id }
            }
            Err(err) => {
                error!(agent_id = %agent_id, error = %err, "script fault, agent stopped");
                AgentNotice::Faulted {
                    agent_id,
                    reason: err.to_string(),
                }
            }
        };
        // The scheduler may already be gone during process shutdown.
        let _ = notices.send(notice);
        result
    });

    info!(agent_id = %spec.id, "agent spawned");

    AgentHandle {
        id: spec.id,
        registers,
        inbound,
        shutdown,
        script_task,
        listener_task,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use botengine_agents::{OverflowPolicy, action_queue};
    use botengine_types::MOTOR_READY;

    use super::*;

    fn spec(id: u32, script: &str) -> AgentSpec {
        AgentSpec {
            id: AgentId::new(id),
            script: Arc::from(script),
            inbound_capacity: 4,
            limits: ScriptLimits::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn faulting_agent_does_not_affect_sibling() {
        let (actions, mut receiver) = action_queue(8, OverflowPolicy::Block);
        let (notices, mut notice_rx) = mpsc::unbounded_channel();
        let root = CancellationToken::new();

        let faulty = spawn_agent(spec(0, r#"throw "bad program";"#), actions.clone(), notices.clone(), &root);
        let healthy = spawn_agent(
            spec(1, "motor_step_fw(); motor_wait(); say(\"done\");"),
            actions,
            notices,
            &root,
        );

        let fault = tokio::time::timeout(Duration::from_secs(2), notice_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(fault, AgentNotice::Faulted { agent_id, .. } if agent_id == AgentId::new(0)));

        // The healthy agent queued its step and is parked in motor_wait.
        let request = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.agent_id, AgentId::new(1));
        assert!(!healthy.script_finished());

        healthy
            .inbound()
            .send(RegisterChange::motor_ready_reset())
            .await
            .unwrap();
        let said = tokio::time::timeout(Duration::from_secs(2), notice_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(said, AgentNotice::Said { ref message, .. } if message == "done"));

        let faulty_exit = faulty.shutdown().await;
        assert!(matches!(faulty_exit.script, Err(AgentError::ScriptFault { .. })));
        let healthy_exit = healthy.shutdown().await;
        assert_eq!(healthy_exit.script, Ok(ScriptOutcome::Completed));
        assert_eq!(healthy_exit.listener.map(|r| r.applied), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_stops_looping_agent() {
        let (actions, mut receiver) = action_queue(8, OverflowPolicy::Block);
        let (notices, _notice_rx) = mpsc::unbounded_channel();
        let root = CancellationToken::new();

        let agent = spawn_agent(
            spec(2, "loop { motor_step_fw(); motor_wait(); }"),
            actions,
            notices,
            &root,
        );
        let first = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap();
        assert!(first.is_some());
        assert_eq!(agent.registers().get(MOTOR_READY), 1);

        root.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(2), agent.shutdown())
            .await
            .unwrap();
        assert_eq!(exit.script, Ok(ScriptOutcome::Cancelled));
        assert_eq!(
            exit.listener.map(|r| r.exit),
            Some(botengine_agents::ListenerExit::Shutdown)
        );
    }
}
