//! Extension context handed to activation.

use std::path::{Path, PathBuf};

use crate::{CommandRegistry, DebugConfigurationProviderRegistry, Disposable, Subscriptions};

/// Process-wide registries the extension registers into.
#[derive(Debug, Clone, Default)]
pub struct Host {
    pub commands: CommandRegistry,
    pub debug_providers: DebugConfigurationProviderRegistry,
}

impl Host {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything activation needs to know about where it runs.
#[derive(Debug)]
pub struct ExtensionContext {
    extension_path: PathBuf,
    workspace_root: PathBuf,
    host: Host,
    pub subscriptions: Subscriptions,
}

impl ExtensionContext {
    #[must_use]
    pub fn new(extension_path: PathBuf, workspace_root: PathBuf, host: Host) -> Self {
        Self {
            extension_path,
            workspace_root,
            host,
            subscriptions: Subscriptions::new(),
        }
    }

    /// Directory the extension is installed in.
    #[must_use]
    pub fn extension_path(&self) -> &Path {
        &self.extension_path
    }

    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn subscribe(&mut self, disposable: Disposable) {
        self.subscriptions.push(disposable);
    }
}
