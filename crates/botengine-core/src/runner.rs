//! Timer-driven scheduler loop with run controls.
//!
//! [`run_scheduler`] wraps [`TickScheduler::step`] with the real-time side:
//!
//! - **Fixed period**: idle for one tick interval, then fire
//! - **Pause/resume**: the loop parks between ticks while paused
//! - **Variable tick speed**: the interval is re-read every tick
//! - **Bounded run**: stop after `max_ticks`
//! - **Clean stop**: the stop token ends the idle wait immediately

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::control::SchedulerControl;
use crate::scheduler::{IdleExit, SchedulerError, SchedulerStats, TickScheduler, TickSummary};

/// Errors that can occur during the run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying scheduler error.
        #[from]
        source: SchedulerError,
    },
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEndReason {
    /// Reached the configured `max_ticks` bound.
    MaxTicksReached,
    /// The stop token fired.
    Stopped,
}

/// Result of a scheduler run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Why the run ended.
    pub end_reason: RunEndReason,
    /// Ticks executed by this run.
    pub total_ticks: u64,
    /// Summary of the last completed tick, if any.
    pub final_summary: Option<TickSummary>,
    /// Scheduler totals at the end of the run.
    pub stats: SchedulerStats,
}

/// Drive `scheduler` from its timer until stopped or bounded out.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails unrecoverably.
pub async fn run_scheduler(
    scheduler: &mut TickScheduler,
    control: &SchedulerControl,
) -> Result<RunResult, RunnerError> {
    let mut final_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = control.max_ticks(),
        tick_interval_ms = control.tick_interval().as_millis(),
        agents = scheduler.registry().len(),
        "scheduler starting"
    );

    let end_reason = loop {
        if control.is_paused() {
            info!(tick = scheduler.tick(), "scheduler paused, waiting for resume");
            control.wait_if_paused().await;
            info!(tick = scheduler.tick(), "scheduler resumed");
        }

        if control.is_stop_requested() {
            break RunEndReason::Stopped;
        }

        if scheduler.idle_for(control.tick_interval(), control.stop_token()).await
            == IdleExit::Stopped
        {
            break RunEndReason::Stopped;
        }

        let summary = scheduler.step().await?;
        total_ticks = total_ticks.saturating_add(1);
        final_summary = Some(summary);

        if control.tick_limit_reached(total_ticks) {
            info!(
                tick = summary.tick,
                max_ticks = control.max_ticks(),
                "tick limit reached"
            );
            break RunEndReason::MaxTicksReached;
        }
    };

    Ok(RunResult {
        end_reason,
        total_ticks,
        final_summary,
        stats: *scheduler.stats(),
    })
}

/// Log how a run ended.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        processed = result.stats.total_processed,
        moved = result.stats.total_moved,
        effects_fired = result.stats.total_effects_fired,
        stale_effects = result.stats.total_stale_effects,
        faults = result.stats.total_faults,
        "scheduler stopped"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            processed = summary.processed,
            moved = summary.moved,
            "final tick summary"
        );
    } else {
        warn!("scheduler stopped with no ticks executed");
    }
}
