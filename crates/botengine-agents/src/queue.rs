//! The bounded action queue shared by every agent.
//!
//! All agents hold a clone of one [`ActionSender`]; the tick scheduler owns
//! the single [`ActionReceiver`]. When the queue is full the configured
//! [`OverflowPolicy`] decides whether the producer waits for space or gets
//! a retryable [`QueueError::Overflow`]. A request is never dropped
//! silently.

use botengine_types::ActionRequest;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;

/// What a producer does when the action queue is at capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until the scheduler drains enough requests to make room.
    #[default]
    Block,
    /// Fail immediately with [`QueueError::Overflow`].
    Reject,
}

/// Create the shared queue.
///
/// A zero capacity is raised to 1; tokio channels cannot be unbuffered.
pub fn action_queue(capacity: usize, policy: OverflowPolicy) -> (ActionSender, ActionReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ActionSender { tx, policy }, ActionReceiver { rx })
}

/// Producer half, cloned into every agent.
#[derive(Debug, Clone)]
pub struct ActionSender {
    tx: mpsc::Sender<ActionRequest>,
    policy: OverflowPolicy,
}

impl ActionSender {
    /// Submit a request according to the overflow policy.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Overflow`] when full under [`OverflowPolicy::Reject`].
    /// - [`QueueError::Cancelled`] when `shutdown` fires while waiting.
    /// - [`QueueError::Closed`] when the scheduler is gone.
    pub async fn submit(
        &self,
        request: ActionRequest,
        shutdown: &CancellationToken,
    ) -> Result<(), QueueError> {
        match self.policy {
            OverflowPolicy::Reject => self.try_submit(request),
            OverflowPolicy::Block => {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => Err(QueueError::Cancelled),
                    sent = self.tx.send(request) => sent.map_err(|_closed| QueueError::Closed),
                }
            }
        }
    }

    /// Submit without waiting, regardless of policy.
    ///
    /// # Errors
    ///
    /// [`QueueError::Overflow`] when full, [`QueueError::Closed`] when the
    /// scheduler is gone.
    pub fn try_submit(&self, request: ActionRequest) -> Result<(), QueueError> {
        self.tx.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => QueueError::Overflow {
                capacity: self.capacity(),
            },
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Configured capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// The overflow policy this sender applies.
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

/// Consumer half, owned by the tick scheduler.
#[derive(Debug)]
pub struct ActionReceiver {
    rx: mpsc::Receiver<ActionRequest>,
}

impl ActionReceiver {
    /// Wait for the next request. `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<ActionRequest> {
        self.rx.recv().await
    }

    /// Take every request queued at the moment of the call, without waiting.
    ///
    /// The count is fixed when the drain starts: requests that arrive while
    /// draining stay queued for the next drain.
    pub fn drain_ready(&mut self) -> Vec<ActionRequest> {
        let ready = self.rx.len();
        let mut drained = Vec::with_capacity(ready);
        for _ in 0..ready {
            match self.rx.try_recv() {
                Ok(request) => drained.push(request),
                Err(_) => break,
            }
        }
        drained
    }

    /// Number of requests currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use botengine_types::{AgentId, Command};

    use super::*;

    fn request(index: u32) -> ActionRequest {
        ActionRequest::new(AgentId::new(index), Command::MoveForward)
    }

    #[tokio::test]
    async fn reject_policy_reports_overflow_on_ninth() {
        let (tx, mut rx) = action_queue(8, OverflowPolicy::Reject);
        assert_eq!(tx.policy(), OverflowPolicy::Reject);
        let shutdown = CancellationToken::new();
        for i in 0..8 {
            tx.submit(request(i), &shutdown).await.unwrap();
        }
        let ninth = tx.submit(request(8), &shutdown).await;
        assert_eq!(ninth, Err(QueueError::Overflow { capacity: 8 }));
        assert!(ninth.unwrap_err().is_retryable());

        assert_eq!(rx.drain_ready().len(), 8);
        tx.submit(request(8), &shutdown).await.unwrap();
        assert_eq!(rx.drain_ready().len(), 1);
    }

    #[tokio::test]
    async fn block_policy_waits_for_space() {
        let (tx, mut rx) = action_queue(8, OverflowPolicy::Block);
        assert_eq!(tx.policy(), OverflowPolicy::Block);
        let shutdown = CancellationToken::new();
        for i in 0..8 {
            tx.submit(request(i), &shutdown).await.unwrap();
        }

        let ninth = {
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { tx.submit(request(8), &shutdown).await })
        };
        tokio::task::yield_now().await;
        assert!(!ninth.is_finished());

        let first = rx.drain_ready();
        assert_eq!(first.len(), 8);
        tokio::time::timeout(Duration::from_secs(1), ninth)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let second = rx.drain_ready();
        assert_eq!(second.len(), 1);
        assert_eq!(second.first().map(|r| r.agent_id), Some(AgentId::new(8)));
    }

    #[tokio::test]
    async fn blocked_submit_observes_shutdown() {
        let (tx, _rx) = action_queue(1, OverflowPolicy::Block);
        let shutdown = CancellationToken::new();
        tx.submit(request(0), &shutdown).await.unwrap();
        shutdown.cancel();
        let result = tx.submit(request(1), &shutdown).await;
        assert_eq!(result, Err(QueueError::Cancelled));
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (tx, rx) = action_queue(2, OverflowPolicy::Block);
        drop(rx);
        assert_eq!(tx.try_submit(request(0)), Err(QueueError::Closed));
        let result = tx.submit(request(0), &CancellationToken::new()).await;
        assert_eq!(result, Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn drain_preserves_arrival_order() {
        let (tx, mut rx) = action_queue(8, OverflowPolicy::Block);
        for i in [3, 1, 2] {
            tx.try_submit(request(i)).unwrap();
        }
        let ids: Vec<u32> = rx.drain_ready().iter().map(|r| r.agent_id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(rx.is_empty());
    }
}
