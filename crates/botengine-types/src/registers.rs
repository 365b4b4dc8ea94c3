//! Register names and the state-change message delivered to agents.

use serde::{Deserialize, Serialize};

/// Register set to 1 while a motor action is in flight and reset to 0 by
/// the scheduler once the action resolves.
pub const MOTOR_READY: &str = "motor_ready";

/// A single register write addressed to one agent's inbound path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterChange {
    /// Register key.
    pub register: String,
    /// New value.
    pub value: i64,
}

impl RegisterChange {
    /// Build a change for an arbitrary register.
    pub fn new(register: impl Into<String>, value: i64) -> Self {
        Self {
            register: register.into(),
            value,
        }
    }

    /// The change that marks the motor idle again.
    pub fn motor_ready_reset() -> Self {
        Self::new(MOTOR_READY, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motor_reset_targets_motor_ready() {
        let change = RegisterChange::motor_ready_reset();
        assert_eq!(change.register, MOTOR_READY);
        assert_eq!(change.value, 0);
    }
}
