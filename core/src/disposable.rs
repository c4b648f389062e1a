//! Disposal handles for listeners, providers and commands.

use tokio::task::JoinHandle;

type DisposeFn = Box<dyn FnOnce() + Send>;

/// A registration that can be released exactly once.
pub struct Disposable {
    label: String,
    dispose: Option<DisposeFn>,
}

impl Disposable {
    pub fn new(label: impl Into<String>, dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Disposal aborts the listener task.
    pub fn from_task(label: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self::new(label, move || task.abort())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dispose(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            tracing::trace!(label = %self.label, "Disposing");
            dispose();
        }
    }
}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("label", &self.label)
            .field("disposed", &self.dispose.is_none())
            .finish()
    }
}

/// Registrations owned by an extension, released when it unloads.
///
/// Disposal runs in reverse registration order. Anything still registered
/// when the collection is dropped is disposed then.
#[derive(Debug, Default)]
pub struct Subscriptions {
    items: Vec<Disposable>,
}

impl Subscriptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, disposable: Disposable) {
        self.items.push(disposable);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(Disposable::label).collect()
    }

    pub fn dispose_all(&mut self) {
        while let Some(item) = self.items.pop() {
            item.dispose();
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Disposable {
        let log = Arc::clone(log);
        Disposable::new(name, move || log.lock().unwrap().push(name))
    }

    #[test]
    fn dispose_all_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscriptions::new();
        subs.push(recording(&log, "listener"));
        subs.push(recording(&log, "provider"));
        subs.push(recording(&log, "command"));
        assert_eq!(subs.labels(), ["listener", "provider", "command"]);

        subs.dispose_all();
        assert!(subs.is_empty());
        assert_eq!(*log.lock().unwrap(), ["command", "provider", "listener"]);
    }

    #[test]
    fn drop_disposes_remaining_items_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut subs = Subscriptions::new();
            subs.push(recording(&log, "a"));
            subs.dispose_all();
            subs.push(recording(&log, "b"));
        }
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn from_task_aborts_listener() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        Disposable::from_task("listener", task).dispose();
        // The sender is dropped together with the aborted task.
        assert!(rx.await.is_err());
    }
}
