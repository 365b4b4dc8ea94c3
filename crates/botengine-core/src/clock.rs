//! Tick clock for the botengine scheduler.
//!
//! The clock is the single source of truth for simulated time. Only the
//! tick scheduler holds a mutable clock; everything else sees tick numbers
//! as plain values.
//!
//! The counter starts at 0 and advances by exactly one per processed tick,
//! using checked arithmetic.

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Monotonic tick counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickClock {
    /// Tick currently being (or about to be) processed.
    tick: u64,
}

impl TickClock {
    /// Create a clock at tick 0.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// Create a clock at an explicit tick (useful for testing).
    pub const fn from_tick(tick: u64) -> Self {
        Self { tick }
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// The tick `delay` ticks after the current one, saturating at `u64::MAX`.
    pub const fn after(&self, delay: u64) -> u64 {
        self.tick.saturating_add(delay)
    }
}
