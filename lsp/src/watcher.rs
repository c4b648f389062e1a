//! Workspace file watching forwarded as `workspace/didChangeWatchedFiles`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{GlobBuilder, GlobMatcher};
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use csharp_host_core::Disposable;
use csharp_host_types::{FileChangeType, FileEvent};

use crate::client::LanguageClient;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid watch glob '{glob}': {source}")]
    Glob {
        glob: String,
        source: globset::Error,
    },
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        source: notify_debouncer_mini::notify::Error,
    },
}

/// Decides which filesystem paths are reported and how.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    matcher: GlobMatcher,
}

impl WatchFilter {
    /// `glob` is matched against paths relative to `root`; `*` does not cross `/`.
    pub fn new(root: impl Into<PathBuf>, glob: &str) -> Result<Self, WatchError> {
        let matcher = GlobBuilder::new(glob)
            .literal_separator(true)
            .build()
            .map_err(|source| WatchError::Glob {
                glob: glob.to_string(),
                source,
            })?
            .compile_matcher();
        Ok(Self {
            root: root.into(),
            matcher,
        })
    }

    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root)
            .is_ok_and(|relative| self.matcher.is_match(relative))
    }

    /// Existing paths are reported as changed, missing ones as deleted.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Option<FileEvent> {
        if !self.matches(path) {
            return None;
        }
        let kind = if path.exists() {
            FileChangeType::Changed
        } else {
            FileChangeType::Deleted
        };
        Some(FileEvent::new(path, kind))
    }
}

/// Recursive watcher over the workspace root feeding a [`LanguageClient`].
///
/// Dropping the watcher stops both the OS watch and the forwarding task.
pub struct FileSyncWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    forward: JoinHandle<()>,
}

impl FileSyncWatcher {
    pub fn start(
        client: LanguageClient,
        root: &Path,
        glob: &str,
        debounce: Duration,
    ) -> Result<Self, WatchError> {
        // Events arrive with the canonical prefix on some platforms.
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let filter = WatchFilter::new(root.clone(), glob)?;

        let (tx, mut rx) = mpsc::channel::<Vec<FileEvent>>(EVENT_CHANNEL_CAPACITY);
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let batch: Vec<FileEvent> = events
                        .iter()
                        .filter_map(|event| filter.classify(&event.path))
                        .collect();
                    if batch.is_empty() {
                        return;
                    }
                    tracing::trace!(count = batch.len(), "Watched files changed");
                    if let Err(e) = tx.try_send(batch) {
                        tracing::warn!("Dropping file events: {e}");
                    }
                }
                Err(e) => tracing::error!("File watcher error: {e}"),
            }
        })
        .map_err(|source| WatchError::Watch {
            path: root.clone(),
            source,
        })?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Watch {
                path: root.clone(),
                source,
            })?;
        tracing::info!(root = %root.display(), glob, "Watching workspace files");

        let forward = tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                if let Err(e) = client.notify_file_events(&batch).await {
                    tracing::debug!("Could not forward file events: {e}");
                }
            }
        });

        Ok(Self {
            _debouncer: debouncer,
            forward,
        })
    }

    #[must_use]
    pub fn into_disposable(self) -> Disposable {
        Disposable::new("file-watcher", move || drop(self))
    }
}

impl Drop for FileSyncWatcher {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

impl std::fmt::Debug for FileSyncWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSyncWatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use csharp_host_core::OutputChannel;
    use csharp_host_types::DEFAULT_WATCH_GLOB;

    use super::*;
    use crate::client::ClientOptions;
    use crate::fake::FakeServer;
    use crate::launcher::ServerCommand;

    #[test]
    fn default_glob_needs_an_extension() {
        let filter = WatchFilter::new("/ws", DEFAULT_WATCH_GLOB).unwrap();
        assert!(filter.matches(Path::new("/ws/Program.cs")));
        assert!(filter.matches(Path::new("/ws/src/App/App.csproj")));
        assert!(!filter.matches(Path::new("/ws/Makefile")));
        assert!(!filter.matches(Path::new("/elsewhere/Program.cs")));
    }

    #[test]
    fn star_does_not_cross_directories() {
        let filter = WatchFilter::new("/ws", "*.cs").unwrap();
        assert!(filter.matches(Path::new("/ws/Program.cs")));
        assert!(!filter.matches(Path::new("/ws/src/Program.cs")));
    }

    #[test]
    fn invalid_glob_is_error() {
        assert!(matches!(
            WatchFilter::new("/ws", "src/[.cs"),
            Err(WatchError::Glob { .. })
        ));
    }

    #[test]
    fn classify_uses_existence() {
        let dir = tempfile::tempdir().unwrap();
        let filter = WatchFilter::new(dir.path(), DEFAULT_WATCH_GLOB).unwrap();
        let present = dir.path().join("Program.cs");
        fs::write(&present, "class P {}").unwrap();

        assert_eq!(
            filter.classify(&present).unwrap().kind,
            FileChangeType::Changed
        );
        assert_eq!(
            filter.classify(&dir.path().join("Gone.cs")).unwrap().kind,
            FileChangeType::Deleted
        );
        assert!(filter.classify(&dir.path().join("README")).is_none());
    }

    #[tokio::test]
    async fn file_writes_reach_the_server() {
        let server = FakeServer::new();
        let dir = tempfile::tempdir().unwrap();
        let client = LanguageClient::new(ClientOptions::new(dir.path()), OutputChannel::new("test"));
        client
            .start(&server, &ServerCommand::for_server("dotnet", Path::new("s.dll")))
            .await
            .unwrap();

        let _watcher = FileSyncWatcher::start(
            client.clone(),
            dir.path(),
            DEFAULT_WATCH_GLOB,
            Duration::from_millis(50),
        )
        .unwrap();
        fs::write(dir.path().join("Program.cs"), "class P {}").unwrap();

        assert!(server.wait_for("workspace/didChangeWatchedFiles", 1).await);
    }

    #[tokio::test]
    async fn watching_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let client = LanguageClient::new(ClientOptions::new(dir.path()), OutputChannel::new("test"));
        let result = FileSyncWatcher::start(
            client,
            &dir.path().join("missing"),
            DEFAULT_WATCH_GLOB,
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(WatchError::Watch { .. })));
    }
}
