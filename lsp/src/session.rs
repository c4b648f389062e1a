//! Activation and deactivation of the language server for one extension session.

use thiserror::Error;

use csharp_host_config::HostConfig;
use csharp_host_core::{ExtensionContext, OutputChannel};
use csharp_host_types::SERVER_NAME;

use crate::client::{ClientError, ClientOptions, LanguageClient};
use crate::launcher::{LaunchError, ServerCommand, ServerLayout, ServerSpawner};
use crate::probe::probe_runtime_version;
use crate::watcher::FileSyncWatcher;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("language server session is already active")]
    AlreadyActive,
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Owns the single language client of an extension session.
#[derive(Debug)]
pub struct ServerSession {
    output: OutputChannel,
    client: Option<LanguageClient>,
}

impl Default for ServerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            output: OutputChannel::new(SERVER_NAME),
            client: None,
        }
    }

    #[must_use]
    pub fn output(&self) -> &OutputChannel {
        &self.output
    }

    #[must_use]
    pub fn client(&self) -> Option<&LanguageClient> {
        self.client.as_ref()
    }

    /// Locate, spawn and initialize the language server.
    ///
    /// `register_features` runs after the client exists and before it is
    /// started, so listeners it attaches observe the first `Running`.
    /// A missing server binary fails before anything is spawned; a failed
    /// runtime probe is only reported.
    pub async fn activate<F>(
        &mut self,
        context: &mut ExtensionContext,
        config: &HostConfig,
        spawner: &dyn ServerSpawner,
        register_features: F,
    ) -> Result<LanguageClient, SessionError>
    where
        F: FnOnce(&mut ExtensionContext, &LanguageClient),
    {
        if self.client.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        let cwd = context.workspace_root().to_path_buf();
        let runtime = config.server.runtime.as_str();

        match probe_runtime_version(runtime, &cwd).await {
            Ok(version) => {
                tracing::info!(runtime, version, "Runtime detected");
                self.output
                    .append_line(format!("Using {runtime} version {version}"));
            }
            Err(e) => {
                tracing::warn!("Runtime probe failed: {e}");
                self.output.append_line(format!("Runtime probe failed: {e}"));
            }
        }

        let install_dir = config
            .server
            .install_dir()
            .unwrap_or_else(|| context.extension_path().to_path_buf());
        let server_path = ServerLayout::from_config(install_dir, &config.server).locate()?;
        let command = ServerCommand::for_server(runtime, &server_path);
        tracing::info!(%command, "Starting language server");

        let client = LanguageClient::new(
            ClientOptions::from_config(cwd.clone(), config),
            self.output.clone(),
        );
        register_features(context, &client);
        self.client = Some(client.clone());
        if let Err(e) = client.start(spawner, &command).await {
            // A client that never came up must not block the next activation.
            self.client = None;
            return Err(e.into());
        }

        match FileSyncWatcher::start(
            client.clone(),
            &cwd,
            &config.sync.watch_glob,
            config.sync.debounce(),
        ) {
            Ok(watcher) => context.subscribe(watcher.into_disposable()),
            Err(e) => tracing::warn!("File watching disabled: {e}"),
        }

        Ok(client)
    }

    /// Stop the client if one was started. Safe to call any number of times.
    pub async fn deactivate(&mut self) -> Result<(), ClientError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        tracing::info!("Stopping language server");
        client.stop().await
    }
}
