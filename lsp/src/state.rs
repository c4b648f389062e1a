//! Server state publication.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use csharp_host_core::Disposable;
use csharp_host_types::{ServerState, StateChange};

const STATE_CHANNEL_CAPACITY: usize = 16;

/// Current server state plus a broadcast of every transition.
///
/// Clones share the same state and channel.
#[derive(Debug, Clone)]
pub struct StateNotifier {
    current: Arc<Mutex<ServerState>>,
    tx: broadcast::Sender<StateChange>,
}

impl Default for StateNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StateNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            current: Arc::new(Mutex::new(ServerState::Stopped)),
            tx,
        }
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }

    /// Move to `new_state` and publish the change. Same-state moves are dropped.
    pub fn transition(&self, new_state: ServerState) -> Option<StateChange> {
        self.apply(|current| current != new_state, new_state)
    }

    /// Like [`transition`](Self::transition), but only when the current state is `expected`.
    pub fn transition_from(
        &self,
        expected: ServerState,
        new_state: ServerState,
    ) -> Option<StateChange> {
        self.apply(|current| current == expected && current != new_state, new_state)
    }

    fn apply(
        &self,
        allowed: impl FnOnce(ServerState) -> bool,
        new_state: ServerState,
    ) -> Option<StateChange> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if !allowed(*current) {
            return None;
        }
        let change = StateChange::new(*current, new_state);
        *current = new_state;
        tracing::debug!(old = %change.old_state, new = %change.new_state, "Server state changed");
        // Published under the lock so receivers see transitions in order. No receivers is fine.
        let _ = self.tx.send(change);
        Some(change)
    }

    /// Run `handler` for every published change, one at a time, in order.
    ///
    /// Must be called inside a tokio runtime. Disposing the handle stops the listener.
    pub fn on_change<F, Fut>(&self, handler: F) -> Disposable
    where
        F: Fn(StateChange) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = self.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => handler(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "State listener lagged; changes dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Disposable::from_task("state-listener", task)
    }
}
