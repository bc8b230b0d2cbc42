//! Observable lifecycle state.

use std::sync::Arc;

use tokio::sync::watch;

/// Server lifecycle: STARTING → LISTENING → DRAINING → STOPPED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Listening,
    Draining,
    Stopped,
}

/// Publishes lifecycle transitions to any number of watchers.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, state: LifecycleState) {
        let previous = self.tx.send_replace(state);
        tracing::debug!(from = ?previous, to = ?state, "Lifecycle transition");
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
