//! Run control shared between the scheduler loop and its operator.
//!
//! Whoever drives the engine (the binary's signal handler, a test) can
//! pause and resume the loop, change the tick speed and request a stop
//! while the loop is running. Atomics keep the loop's per-tick checks
//! lock-free.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Smallest tick interval accepted at runtime.
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Shared control state for one scheduler run.
#[derive(Debug)]
pub struct SchedulerControl {
    /// Whether the loop should park between ticks.
    paused: AtomicBool,

    /// Wakes the loop when resumed.
    resume_notify: Notify,

    /// Stop signal; also the root of every agent's shutdown token.
    stop: CancellationToken,

    /// Current tick interval in milliseconds.
    tick_interval_ms: AtomicU64,

    /// Stop after this many ticks (0 = unbounded).
    max_ticks: u64,

    /// Wall-clock start time.
    started_at: DateTime<Utc>,
}

impl SchedulerControl {
    /// Create control state around an existing stop token.
    pub fn new(tick_interval_ms: u64, max_ticks: u64, stop: CancellationToken) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop,
            tick_interval_ms: AtomicU64::new(tick_interval_ms.max(MIN_TICK_INTERVAL_MS)),
            max_ticks,
            started_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether the loop is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause after the current tick.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume and wake the loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until not paused or until a stop is requested.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.stop.is_cancelled() {
            tokio::select! {
                () = self.resume_notify.notified() => {}
                () = self.stop.cancelled() => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// The stop token.
    pub const fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    // -----------------------------------------------------------------------
    // Tick speed
    // -----------------------------------------------------------------------

    /// Current tick interval.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.load(Ordering::Acquire))
    }

    /// Change the tick interval. Returns the previous interval in
    /// milliseconds, or `None` if `ms` is below [`MIN_TICK_INTERVAL_MS`].
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms < MIN_TICK_INTERVAL_MS {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Whether `ticks_run` has reached the tick bound.
    pub const fn tick_limit_reached(&self, ticks_run: u64) -> bool {
        self.max_ticks > 0 && ticks_run >= self.max_ticks
    }

    /// Configured tick bound (0 = unbounded).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Elapsed wall-clock seconds since creation.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }
}
