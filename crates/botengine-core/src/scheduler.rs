//! The tick scheduler: the single authority over simulated time.
//!
//! Each fire walks a fixed sequence of phases:
//!
//! 1. **Draining** -- emit `GameTick`, take exactly the requests queued
//!    when the drain started, and process them in arrival order (move, emit
//!    `AgentMoved`, schedule the `motor_ready` reset).
//! 2. **Resolving** -- fire every delayed action due at this tick once,
//!    delivering register changes through the agent registry.
//! 3. **Advancing** -- emit `DoneProcessing` and advance the clock.
//!
//! Between fires the scheduler is **Idle**: [`TickScheduler::idle_for`]
//! handles agent notices until the timer fires. Requests stay in the bounded
//! queue, so at most its capacity is processed per tick and producers feel
//! the overflow policy.
//! [`TickScheduler::step`] runs one fire directly, which gives tests a
//! virtual clock.

use std::time::Duration;

use botengine_agents::ActionReceiver;
use botengine_types::{ActionRequest, AgentId, AgentNotice, Command, RegisterChange, TraceEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{ClockError, TickClock};
use crate::config::SchedulerConfig;
use crate::delayed::{DelayedAction, DelayedActions, Effect};
use crate::registry::{AgentRegistry, AgentStatus, DeliveryError};
use crate::trace::TraceSink;

/// Errors that abort a scheduler step.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The tick counter could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Waiting for the timer; incoming requests wait in the queue.
    Idle,
    /// Taking and processing this tick's requests.
    Draining,
    /// Firing due delayed actions.
    Resolving,
    /// Finishing the tick and advancing the clock.
    Advancing,
}

/// Why [`TickScheduler::idle_for`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleExit {
    /// The period elapsed; the next tick is due.
    TimerFired,
    /// The stop token fired.
    Stopped,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick that was processed.
    pub tick: u64,
    /// Requests taken from the queue (including discarded ones).
    pub processed: usize,
    /// Requests that moved an agent.
    pub moved: usize,
    /// Delayed actions fired.
    pub effects_fired: usize,
    /// Fired actions whose target tick had already passed.
    pub stale_effects: usize,
    /// Agents newly marked faulted since the previous tick.
    pub faults: usize,
}

/// Totals across every tick run so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ticks completed.
    pub ticks: u64,
    /// Requests processed.
    pub total_processed: u64,
    /// Moves applied.
    pub total_moved: u64,
    /// Delayed actions fired.
    pub total_effects_fired: u64,
    /// Stale delayed actions fired.
    pub total_stale_effects: u64,
    /// Agent faults recorded.
    pub total_faults: u64,
}

impl SchedulerStats {
    fn record(&mut self, summary: &TickSummary) {
        self.ticks = self.ticks.saturating_add(1);
        self.total_processed = self.total_processed.saturating_add(widen(summary.processed));
        self.total_moved = self.total_moved.saturating_add(widen(summary.moved));
        self.total_effects_fired = self
            .total_effects_fired
            .saturating_add(widen(summary.effects_fired));
        self.total_stale_effects = self
            .total_stale_effects
            .saturating_add(widen(summary.stale_effects));
    }

    fn record_fault(&mut self) {
        self.total_faults = self.total_faults.saturating_add(1);
    }
}

fn widen(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Owns the clock, the delayed action list and the agent registry, and
/// consumes the action queue and the agent notice channel.
pub struct TickScheduler {
    clock: TickClock,
    phase: SchedulerPhase,
    actions: ActionReceiver,
    notices: mpsc::UnboundedReceiver<AgentNotice>,
    notices_open: bool,
    delayed: DelayedActions,
    registry: AgentRegistry,
    sink: Box<dyn TraceSink>,
    config: SchedulerConfig,
    stats: SchedulerStats,
    tick_faults: usize,
}

impl core::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("tick", &self.clock.tick())
            .field("phase", &self.phase)
            .field("queued", &self.actions.len())
            .field("delayed", &self.delayed.len())
            .field("agents", &self.registry.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl TickScheduler {
    /// Create a scheduler at tick 0.
    pub fn new(
        config: SchedulerConfig,
        actions: ActionReceiver,
        notices: mpsc::UnboundedReceiver<AgentNotice>,
        registry: AgentRegistry,
        sink: Box<dyn TraceSink>,
    ) -> Self {
        Self {
            clock: TickClock::new(),
            phase: SchedulerPhase::Idle,
            actions,
            notices,
            notices_open: true,
            delayed: DelayedActions::new(),
            registry,
            sink,
            config,
            stats: SchedulerStats::default(),
            tick_faults: 0,
        }
    }

    /// The tick that the next [`step`](Self::step) will process.
    pub const fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// Current phase.
    pub const fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// Accumulated totals.
    pub const fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Scheduler settings.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The agent registry.
    pub const fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Mutable access to the agent registry (for spawning after creation).
    pub const fn registry_mut(&mut self) -> &mut AgentRegistry {
        &mut self.registry
    }

    /// Pending delayed actions.
    pub const fn delayed(&self) -> &DelayedActions {
        &self.delayed
    }

    /// Schedule an additional delayed action.
    pub fn schedule(&mut self, action: DelayedAction) {
        self.delayed.schedule(action);
    }

    /// Requests waiting in the action queue.
    pub fn queued(&self) -> usize {
        self.actions.len()
    }

    /// Give up the registry, typically to shut every agent down.
    pub fn into_registry(self) -> AgentRegistry {
        self.registry
    }

    /// Wait in the idle phase for one tick period or until `stop` fires.
    ///
    /// Agent notices are handled as they arrive. Requests are left in the
    /// action queue for the next [`step`](Self::step).
    pub async fn idle_for(&mut self, period: Duration, stop: &CancellationToken) -> IdleExit {
        self.phase = SchedulerPhase::Idle;
        let sleep = tokio::time::sleep(period);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => return IdleExit::Stopped,
                () = &mut sleep => return IdleExit::TimerFired,
                notice = self.notices.recv(), if self.notices_open => match notice {
                    Some(notice) => self.handle_notice(notice),
                    None => self.notices_open = false,
                },
            }
        }
    }

    /// Run exactly one tick.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Clock`] if the tick counter cannot advance.
    pub async fn step(&mut self) -> Result<TickSummary, SchedulerError> {
        let tick = self.clock.tick();
        self.absorb_notices();

        self.phase = SchedulerPhase::Draining;
        self.sink.emit(&TraceEvent::GameTick { tick });
        let batch = self.actions.drain_ready();
        let processed = batch.len();
        let moved = batch
            .into_iter()
            .filter(|request| self.process(request, tick))
            .count();

        self.phase = SchedulerPhase::Resolving;
        let (effects_fired, stale_effects) = self.resolve(tick).await;

        self.phase = SchedulerPhase::Advancing;
        self.sink.emit(&TraceEvent::DoneProcessing { tick });
        let advanced = self.clock.advance();
        self.phase = SchedulerPhase::Idle;
        advanced?;

        let summary = TickSummary {
            tick,
            processed,
            moved,
            effects_fired,
            stale_effects,
            faults: std::mem::take(&mut self.tick_faults),
        };
        self.stats.record(&summary);
        debug!(
            tick,
            processed,
            moved,
            effects_fired,
            stale_effects,
            pending = self.delayed.len(),
            "tick complete"
        );
        Ok(summary)
    }

    /// Apply one drained request. Returns `true` if an agent moved.
    fn process(&mut self, request: &ActionRequest, tick: u64) -> bool {
        let agent_id = request.agent_id;
        match self.registry.status(agent_id) {
            None => {
                warn!(tick, agent_id = %agent_id, "request from unknown agent discarded");
                return false;
            }
            Some(AgentStatus::Faulted { .. }) => {
                warn!(tick, agent_id = %agent_id, "request from faulted agent discarded");
                return false;
            }
            Some(_) => {}
        }

        match request.command {
            Command::MoveForward => {
                let position = self.registry.move_forward(agent_id);
                debug!(tick, agent_id = %agent_id, position = ?position, "agent moved");
                self.sink.emit(&TraceEvent::AgentMoved { tick, agent_id });
                self.delayed.schedule(DelayedAction {
                    target_tick: self.clock.after(self.config.motor_delay_ticks),
                    effect: Effect::SetRegister {
                        agent_id,
                        change: RegisterChange::motor_ready_reset(),
                    },
                });
                true
            }
        }
    }

    /// Fire every due action. Returns `(fired, stale)`.
    async fn resolve(&mut self, tick: u64) -> (usize, usize) {
        let due = self.delayed.take_due(tick);
        let fired = due.len();
        let mut stale: usize = 0;

        for action in due {
            if action.target_tick < tick {
                warn!(
                    tick,
                    target_tick = action.target_tick,
                    agent_id = %action.effect.agent_id(),
                    "stale delayed action, firing late"
                );
                stale = stale.saturating_add(1);
            }
            self.fire(action.effect, tick).await;
        }

        (fired, stale)
    }

    async fn fire(&mut self, effect: Effect, tick: u64) {
        match effect {
            Effect::SetRegister { agent_id, change } => {
                let policy = self.config.handoff();
                match self.registry.deliver(agent_id, change, policy).await {
                    Ok(()) => trace!(tick, agent_id = %agent_id, "register change delivered"),
                    Err(DeliveryError::Closed { .. }) => {
                        debug!(tick, agent_id = %agent_id, "agent stopped, register change dropped");
                    }
                    Err(err @ DeliveryError::UnknownAgent { .. }) => {
                        warn!(tick, error = %err, "register change dropped");
                    }
                    Err(err @ DeliveryError::ListenerUnresponsive { .. }) => {
                        error!(tick, error = %err, "listener unresponsive, agent faulted");
                        self.fault(agent_id, err.to_string());
                    }
                }
            }
        }
    }

    fn absorb_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            self.handle_notice(notice);
        }
    }

    fn handle_notice(&mut self, notice: AgentNotice) {
        match notice {
            AgentNotice::Said { agent_id, message } => {
                self.sink.emit(&TraceEvent::AgentSaid { agent_id, message });
            }
            AgentNotice::Finished { agent_id } => {
                info!(agent_id = %agent_id, "agent script finished");
                self.registry.mark_finished(agent_id);
            }
            AgentNotice::Faulted { agent_id, reason } => self.fault(agent_id, reason),
        }
    }

    fn fault(&mut self, agent_id: AgentId, reason: String) {
        if self.registry.mark_faulted(agent_id, reason.clone()) {
            self.tick_faults = self.tick_faults.saturating_add(1);
            self.stats.record_fault();
            self.sink.emit(&TraceEvent::AgentFaulted { agent_id, reason });
        }
    }
}
