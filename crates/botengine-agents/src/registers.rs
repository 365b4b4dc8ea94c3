//! Per-agent register store.
//!
//! A [`RegisterStore`] maps string keys to integer values. It is owned by a
//! single agent but touched from two execution contexts: the agent's script
//! thread (host primitives) and its register-update listener task. Every
//! read and write goes through one mutex, so no reader ever observes a
//! partially-applied compound update.
//!
//! Each write also bumps a revision counter published on a
//! [`tokio::sync::watch`] channel. Waiters subscribe to the revision and
//! re-check their predicate on every bump instead of polling on a timer.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::RegisterError;

/// The register map as seen inside an exclusive [`RegisterStore::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    cells: BTreeMap<String, i64>,
}

impl Registers {
    /// Read a register, defaulting to 0 when it has never been written.
    pub fn get(&self, key: &str) -> i64 {
        self.cells.get(key).copied().unwrap_or(0)
    }

    /// Write a register, creating it on first use.
    pub fn set(&mut self, key: &str, value: i64) {
        if let Some(cell) = self.cells.get_mut(key) {
            *cell = value;
        } else {
            self.cells.insert(key.to_owned(), value);
        }
    }

    /// Iterate over all written registers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of registers that have been written.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no register has been written yet.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Key-to-integer state cell exclusively owned by one agent.
#[derive(Debug)]
pub struct RegisterStore {
    registers: Mutex<Registers>,
    revision: watch::Sender<u64>,
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            registers: Mutex::new(Registers::default()),
            revision,
        }
    }

    /// Lock the register map.
    ///
    /// A poisoned lock is recovered: register values are independent
    /// integers, so a panic mid-update cannot leave a broken invariant.
    fn lock(&self) -> MutexGuard<'_, Registers> {
        self.registers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Read a register (0 if absent).
    pub fn get(&self, key: &str) -> i64 {
        self.lock().get(key)
    }

    /// Write a register and wake any waiters.
    pub fn set(&self, key: &str, value: i64) {
        self.lock().set(key, value);
        self.publish();
    }

    /// Run `f` with exclusive access to the whole register map.
    ///
    /// Used for compound check-and-set operations that must not interleave
    /// with the listener. Waiters are woken after the lock is released.
    pub fn update<R>(&self, f: impl FnOnce(&mut Registers) -> R) -> R {
        let result = {
            let mut registers = self.lock();
            f(&mut registers)
        };
        self.publish();
        result
    }

    /// Copy every register out of the store.
    pub fn snapshot(&self) -> Registers {
        self.lock().clone()
    }

    /// Current revision; increases on every write.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Wait until `predicate` holds for the value of `key`.
    ///
    /// Returns the value that satisfied the predicate. Checks immediately,
    /// then re-checks after every register write on this store.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::Cancelled`] if `shutdown` fires first.
    pub async fn wait_until(
        &self,
        key: &str,
        predicate: impl Fn(i64) -> bool,
        shutdown: &CancellationToken,
    ) -> Result<i64, RegisterError> {
        // Subscribe before the first check so a write landing between the
        // check and the await still wakes us.
        let mut changes = self.revision.subscribe();
        loop {
            let value = self.get(key);
            if predicate(value) {
                return Ok(value);
            }
            tokio::select! {
                biased;
                () = shutdown.cancelled() => return Err(RegisterError::Cancelled),
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Err(RegisterError::Cancelled);
                    }
                }
            }
        }
    }

    /// Wait until `key` holds exactly `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::Cancelled`] if `shutdown` fires first.
    pub async fn wait_for(
        &self,
        key: &str,
        expected: i64,
        shutdown: &CancellationToken,
    ) -> Result<(), RegisterError> {
        self.wait_until(key, |value| value == expected, shutdown)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use botengine_types::MOTOR_READY;

    use super::*;

    #[test]
    fn absent_register_reads_zero() {
        let store = RegisterStore::new();
        assert_eq!(store.get(MOTOR_READY), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn set_creates_and_overwrites() {
        let store = RegisterStore::new();
        store.set("heading", 2);
        store.set("heading", 3);
        assert_eq!(store.get("heading"), 3);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn update_is_one_exclusive_step() {
        let store = RegisterStore::new();
        let first = store.update(|regs| {
            if regs.get(MOTOR_READY) == 0 {
                regs.set(MOTOR_READY, 1);
                true
            } else {
                false
            }
        });
        let second = store.update(|regs| {
            if regs.get(MOTOR_READY) == 0 {
                regs.set(MOTOR_READY, 1);
                true
            } else {
                false
            }
        });
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn every_write_bumps_revision() {
        let store = RegisterStore::new();
        let before = store.revision();
        store.set("a", 1);
        store.update(|regs| regs.set("b", 2));
        assert_eq!(store.revision(), before.wrapping_add(2));
    }

    #[test]
    fn repeated_reset_is_idempotent() {
        let store = RegisterStore::new();
        store.set(MOTOR_READY, 1);
        store.set(MOTOR_READY, 0);
        assert_eq!(store.get(MOTOR_READY), 0);
        store.set(MOTOR_READY, 0);
        assert_eq!(store.get(MOTOR_READY), 0);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_satisfied() {
        let store = RegisterStore::new();
        let shutdown = CancellationToken::new();
        store.wait_for(MOTOR_READY, 0, &shutdown).await.unwrap();
    }

    #[tokio::test]
    async fn wait_wakes_on_write() {
        let store = Arc::new(RegisterStore::new());
        store.set(MOTOR_READY, 1);
        let shutdown = CancellationToken::new();

        let waiter = {
            let store = Arc::clone(&store);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { store.wait_for(MOTOR_READY, 0, &shutdown).await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        store.set(MOTOR_READY, 0);
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_ignores_unrelated_writes() {
        let store = Arc::new(RegisterStore::new());
        store.set(MOTOR_READY, 1);
        let shutdown = CancellationToken::new();

        let waiter = {
            let store = Arc::clone(&store);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { store.wait_for(MOTOR_READY, 0, &shutdown).await })
        };

        store.set("heading", 4);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        shutdown.cancel();
        let result = waiter.await.unwrap();
        assert_eq!(result, Err(RegisterError::Cancelled));
    }

    #[tokio::test]
    async fn shutdown_cancels_wait() {
        let store = RegisterStore::new();
        store.set(MOTOR_READY, 1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let result = store.wait_for(MOTOR_READY, 0, &shutdown).await;
        assert_eq!(result, Err(RegisterError::Cancelled));
    }

    #[test]
    fn concurrent_writers_never_tear() {
        let store = Arc::new(RegisterStore::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        store.update(|regs| {
                            let next = regs.get("counter").saturating_add(1);
                            regs.set("counter", next);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("counter"), 2000);
    }
}
