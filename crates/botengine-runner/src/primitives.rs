//! Host primitives exposed to agent scripts.
//!
//! Primitives run on the agent's dedicated script thread, never on an async
//! worker. Blocking primitives park that thread on a future through the
//! runtime [`Handle`], so a waiting agent never stalls the scheduler or any
//! sibling agent.

use std::sync::Arc;

use botengine_agents::{ActionSender, QueueError, RegisterStore};
use botengine_types::{ActionRequest, AgentId, AgentNotice, Command, MOTOR_READY};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PrimitiveError;

/// Everything a script's host primitives can reach.
///
/// One context per agent. It holds the agent's own register store, the
/// shared action queue, and the notice channel back to the scheduler; it
/// has no path to any other agent's state.
#[derive(Debug, Clone)]
pub struct HostContext {
    agent_id: AgentId,
    registers: Arc<RegisterStore>,
    actions: ActionSender,
    notices: mpsc::UnboundedSender<AgentNotice>,
    shutdown: CancellationToken,
    runtime: Handle,
}

impl HostContext {
    /// Build a context for one agent.
    pub const fn new(
        agent_id: AgentId,
        registers: Arc<RegisterStore>,
        actions: ActionSender,
        notices: mpsc::UnboundedSender<AgentNotice>,
        shutdown: CancellationToken,
        runtime: Handle,
    ) -> Self {
        Self {
            agent_id,
            registers,
            actions,
            notices,
            shutdown,
            runtime,
        }
    }

    /// The agent this context belongs to.
    pub const fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// The agent's shutdown token.
    pub const fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Block until the motor is idle (`motor_ready == 0`).
    ///
    /// Wakes on the register change notification rather than polling.
    ///
    /// # Errors
    ///
    /// [`PrimitiveError::Cancelled`] if the agent is shut down while waiting.
    pub fn motor_wait(&self) -> Result<(), PrimitiveError> {
        self.runtime
            .block_on(self.registers.wait_for(MOTOR_READY, 0, &self.shutdown))
            .map_err(|_cancelled| PrimitiveError::Cancelled)
    }

    /// Request one forward step if no motor action is in flight.
    ///
    /// The check of `motor_ready` and the switch to 1 happen in one
    /// exclusive register update, so concurrent callers can never queue a
    /// second request while one is pending. Returns `true` when a request
    /// was queued.
    ///
    /// Under the reject overflow policy a full queue rolls `motor_ready`
    /// back to 0 and returns `false`; the script may simply try again.
    ///
    /// # Errors
    ///
    /// [`PrimitiveError::Cancelled`] on shutdown while waiting for queue
    /// space, [`PrimitiveError::QueueClosed`] if the scheduler is gone.
    pub fn motor_step_fw(&self) -> Result<bool, PrimitiveError> {
        let claimed = self.registers.update(|regs| {
            if regs.get(MOTOR_READY) == 0 {
                regs.set(MOTOR_READY, 1);
                true
            } else {
                false
            }
        });
        if !claimed {
            debug!(agent_id = %self.agent_id, "motor busy, step ignored");
            return Ok(false);
        }

        let request = ActionRequest::new(self.agent_id, Command::MoveForward);
        let submitted = self
            .runtime
            .block_on(self.actions.submit(request, &self.shutdown));

        match submitted {
            Ok(()) => Ok(true),
            Err(err) => {
                self.registers.set(MOTOR_READY, 0);
                match err {
                    QueueError::Overflow { capacity } => {
                        warn!(
                            agent_id = %self.agent_id,
                            capacity,
                            policy = ?self.actions.policy(),
                            "action queue full, step rejected"
                        );
                        Ok(false)
                    }
                    QueueError::Cancelled => Err(PrimitiveError::Cancelled),
                    QueueError::Closed => Err(PrimitiveError::QueueClosed),
                }
            }
        }
    }

    /// Read one of the agent's registers.
    pub fn register(&self, key: &str) -> i64 {
        self.registers.get(key)
    }

    /// Emit a free-text message to the trace.
    pub fn say(&self, message: &str) {
        let notice = AgentNotice::Said {
            agent_id: self.agent_id,
            message: message.to_owned(),
        };
        if self.notices.send(notice).is_err() {
            debug!(agent_id = %self.agent_id, "notice channel closed, message discarded");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Barrier;
    use std::time::Duration;

    use botengine_agents::{OverflowPolicy, action_queue};

    use super::*;

    fn context(
        policy: OverflowPolicy,
        capacity: usize,
    ) -> (
        HostContext,
        botengine_agents::ActionReceiver,
        mpsc::UnboundedReceiver<AgentNotice>,
    ) {
        let (actions, receiver) = action_queue(capacity, policy);
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let ctx = HostContext::new(
            AgentId::new(0),
            Arc::new(RegisterStore::new()),
            actions,
            notices,
            CancellationToken::new(),
            Handle::current(),
        );
        (ctx, receiver, notice_rx)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn step_sets_motor_ready_and_queues_once() {
        let (ctx, mut receiver, _notices) = context(OverflowPolicy::Block, 8);
        let worker = ctx.clone();
        let (first, second) = tokio::task::spawn_blocking(move || {
            (worker.motor_step_fw().unwrap(), worker.motor_step_fw().unwrap())
        })
        .await
        .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(ctx.register(MOTOR_READY), 1);
        let drained = receiver.drain_ready();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained.first().map(|r| r.command), Some(Command::MoveForward));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_steps_never_double_enqueue() {
        let (ctx, mut receiver, _notices) = context(OverflowPolicy::Block, 8);
        let barrier = Arc::new(Barrier::new(8));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ctx.motor_step_fw().unwrap()
                })
            })
            .collect();
        let queued = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|queued| *queued)
            .count();

        assert_eq!(queued, 1);
        assert_eq!(receiver.drain_ready().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rejected_step_rolls_motor_back() {
        let (ctx, mut receiver, _notices) = context(OverflowPolicy::Reject, 1);
        ctx.actions
            .try_submit(ActionRequest::new(AgentId::new(9), Command::MoveForward))
            .unwrap();

        let worker = ctx.clone();
        let queued = tokio::task::spawn_blocking(move || worker.motor_step_fw().unwrap())
            .await
            .unwrap();

        assert!(!queued);
        assert_eq!(ctx.register(MOTOR_READY), 0);
        assert_eq!(receiver.drain_ready().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn motor_wait_unblocks_on_reset() {
        let (ctx, _receiver, _notices) = context(OverflowPolicy::Block, 8);
        ctx.registers.set(MOTOR_READY, 1);

        let worker = ctx.clone();
        let waiter = tokio::task::spawn_blocking(move || worker.motor_wait());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        ctx.registers.set(MOTOR_READY, 0);
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn motor_wait_observes_shutdown() {
        let (ctx, _receiver, _notices) = context(OverflowPolicy::Block, 8);
        ctx.registers.set(MOTOR_READY, 1);

        let worker = ctx.clone();
        let waiter = tokio::task::spawn_blocking(move || worker.motor_wait());
        ctx.shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(PrimitiveError::Cancelled));
    }

    #[tokio::test]
    async fn say_forwards_notice() {
        let (ctx, _receiver, mut notices) = context(OverflowPolicy::Block, 8);
        ctx.say("hello");
        let notice = notices.recv().await.unwrap();
        assert_eq!(
            notice,
            AgentNotice::Said {
                agent_id: AgentId::new(0),
                message: "hello".to_owned(),
            }
        );
    }
}
