//! Register-update listener.
//!
//! Each agent runs one listener task for its whole lifetime. The listener
//! is the only consumer of the agent's inbound path: it receives
//! [`RegisterChange`] messages from the scheduler and applies them to the
//! agent's [`RegisterStore`] one at a time, in arrival order.

use std::sync::Arc;

use botengine_types::{AgentId, RegisterChange};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::registers::RegisterStore;

/// Why a listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// The shutdown signal fired.
    Shutdown,
    /// Every sender for the inbound path was dropped.
    Disconnected,
}

/// Final report of a listener run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerReport {
    /// Number of register changes applied.
    pub applied: u64,
    /// Why the listener stopped.
    pub exit: ListenerExit,
}

/// Create an agent's inbound path with the given capacity.
pub fn inbound_channel(
    capacity: usize,
) -> (mpsc::Sender<RegisterChange>, mpsc::Receiver<RegisterChange>) {
    mpsc::channel(capacity.max(1))
}

/// Apply inbound register changes until shutdown or disconnect.
pub async fn run_listener(
    agent_id: AgentId,
    store: Arc<RegisterStore>,
    mut inbound: mpsc::Receiver<RegisterChange>,
    shutdown: CancellationToken,
) -> ListenerReport {
    let mut applied: u64 = 0;
    debug!(agent_id = %agent_id, "register listener started");

    let exit = loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break ListenerExit::Shutdown,
            change = inbound.recv() => {
                let Some(change) = change else {
                    break ListenerExit::Disconnected;
                };
                trace!(
                    agent_id = %agent_id,
                    register = change.register,
                    value = change.value,
                    "applying register change"
                );
                store.set(&change.register, change.value);
                applied = applied.saturating_add(1);
            }
        }
    };

    debug!(agent_id = %agent_id, applied, exit = ?exit, "register listener stopped");
    ListenerReport { applied, exit }
}
