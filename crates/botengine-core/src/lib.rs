//! Tick clock, scheduler, and orchestration for botengine.
//!
//! This crate owns the fixed-period tick cycle that turns agent action
//! requests into world changes: drain the action queue, apply moves,
//! resolve delayed register changes, advance the clock.
//!
//! # Modules
//!
//! - [`clock`] -- Monotonic tick counter with checked advance.
//! - [`config`] -- Configuration loading from `botengine-config.yaml` into
//!   strongly-typed structs.
//! - [`control`] -- Pause, resume, tick speed, and stop shared with the
//!   run loop.
//! - [`delayed`] -- Effects scheduled for a future tick.
//! - [`registry`] -- Agent handles, positions, and lifecycle status.
//! - [`runner`] -- The timer-driven run loop around [`TickScheduler`].
//! - [`scheduler`] -- The per-tick state machine.
//! - [`trace`] -- [`TraceSink`] trait and its implementations.
//!
//! [`TickScheduler`]: scheduler::TickScheduler
//! [`TraceSink`]: trace::TraceSink

pub mod clock;
pub mod config;
pub mod control;
pub mod delayed;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod trace;

pub use clock::{ClockError, TickClock};
pub use config::{AgentsConfig, ConfigError, EngineConfig, LoggingConfig, SchedulerConfig};
pub use control::SchedulerControl;
pub use delayed::{DelayedAction, DelayedActions, Effect};
pub use registry::{AgentRegistry, AgentStatus, DeliveryError, HandoffPolicy, Position};
pub use runner::{RunEndReason, RunResult, RunnerError, log_run_end, run_scheduler};
pub use scheduler::{
    IdleExit, SchedulerError, SchedulerPhase, SchedulerStats, TickScheduler, TickSummary,
};
pub use trace::{ChannelSink, NoOpSink, StdoutSink, TraceSink, TracingSink};
