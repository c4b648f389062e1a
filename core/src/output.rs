//! Output channel shared by the client and the debug bridge.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Lines kept in memory before the oldest are dropped.
const MAX_RETAINED_LINES: usize = 4096;

/// Named, append-only log channel.
///
/// Clones share the same buffer. Every line is mirrored to `tracing` so the
/// log file carries the full server transcript even after lines roll off.
#[derive(Debug, Clone)]
pub struct OutputChannel {
    name: Arc<str>,
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl OutputChannel {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            lines: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn append_line(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "csharp_host::output", channel = %self.name, "{line}");

        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == MAX_RETAINED_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Snapshot of the retained lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.contains(needle))
    }
}
