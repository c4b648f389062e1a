//! One activation of the C# extension: language server plus debugger glue.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};

use csharp_host_config::HostConfig;
use csharp_host_core::{ExtensionContext, Host};
use csharp_host_debug::{BridgeOptions, register_debugger};
use csharp_host_lsp::{LanguageClient, ServerSession, ServerSpawner, path_to_file_uri};
use csharp_host_types::{
    DEBUGGER_TYPE, DebugConfiguration, GENERATE_ASSETS_COMMAND, LANGUAGE_ID, TextDocument,
};

use crate::commands::{HELP, HostCommand};

/// What a command produced for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Text(String),
    Quit,
}

pub struct Extension {
    config: HostConfig,
    context: ExtensionContext,
    session: ServerSession,
}

impl Extension {
    #[must_use]
    pub fn new(extension_path: PathBuf, workspace_root: PathBuf, config: HostConfig) -> Self {
        Self {
            config,
            context: ExtensionContext::new(extension_path, workspace_root, Host::new()),
            session: ServerSession::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &ExtensionContext {
        &self.context
    }

    #[must_use]
    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    #[must_use]
    pub fn client(&self) -> Option<&LanguageClient> {
        self.session.client()
    }

    /// Start the language server and register the debugger integration.
    ///
    /// The debugger pieces are registered before the server starts so the
    /// first transition to `Running` already reconciles the assets.
    pub async fn activate(&mut self, spawner: &dyn ServerSpawner) -> Result<()> {
        let options = BridgeOptions {
            ensure_assets: self.config.debug.generate_assets,
        };
        let mut registered = Ok(());
        self.session
            .activate(&mut self.context, &self.config, spawner, |context, client| {
                registered = register_debugger(context, client, options);
            })
            .await
            .context("failed to start the language server")?;
        registered.context("failed to register the debugger")?;

        tracing::info!(
            workspace = %self.context.workspace_root().display(),
            subscriptions = self.context.subscriptions.len(),
            "Extension activated"
        );
        Ok(())
    }

    /// Stop the server and release every registration. Safe to repeat.
    pub async fn deactivate(&mut self) -> Result<()> {
        let stopped = self.session.deactivate().await;
        self.context.subscriptions.dispose_all();
        stopped.context("language server did not shut down cleanly")
    }

    pub async fn run(&self, command: HostCommand) -> Result<CommandOutput> {
        let text = match command {
            HostCommand::Quit => return Ok(CommandOutput::Quit),
            HostCommand::Help => HELP.to_string(),
            HostCommand::GenerateAssets(index) => {
                let args = index.map(|index| vec![json!(index)]).unwrap_or_default();
                let outcome = self
                    .context
                    .host()
                    .commands
                    .execute(GENERATE_ASSETS_COMMAND, args)
                    .await?;
                pretty(&outcome)?
            }
            HostCommand::Configurations => {
                let configurations = self
                    .context
                    .host()
                    .debug_providers
                    .provide(DEBUGGER_TYPE, self.context.workspace_root())
                    .await?;
                pretty(&serde_json::to_value(configurations)?)?
            }
            HostCommand::Resolve => {
                let resolved = self
                    .context
                    .host()
                    .debug_providers
                    .resolve(
                        DEBUGGER_TYPE,
                        self.context.workspace_root(),
                        DebugConfiguration::default(),
                    )
                    .await?;
                match resolved {
                    Some(configuration) => pretty(&serde_json::to_value(configuration)?)?,
                    None => "launch aborted: no executable project".to_string(),
                }
            }
            HostCommand::Open(path) => {
                let client = self.active_client()?;
                let path = self.workspace_path(&path);
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let uri = path_to_file_uri(&path)?;
                let document = TextDocument::new(uri.as_str(), language_of(&path), text);
                if client.sync_document(&document).await? {
                    let version = client.document_version(uri.as_str()).unwrap_or_default();
                    format!("synced {uri} (version {version})")
                } else {
                    format!("{} is not a {LANGUAGE_ID} document", path.display())
                }
            }
            HostCommand::Close(path) => {
                let client = self.active_client()?;
                let uri = path_to_file_uri(&self.workspace_path(&path))?;
                if client.close_document(uri.as_str()).await? {
                    format!("closed {uri}")
                } else {
                    format!("{uri} is not open")
                }
            }
            HostCommand::State => match self.client() {
                Some(client) => client.state().to_string(),
                None => "inactive".to_string(),
            },
            HostCommand::Output => self.session.output().lines().join("\n"),
        };
        Ok(CommandOutput::Text(text))
    }

    fn active_client(&self) -> Result<&LanguageClient> {
        self.client()
            .ok_or_else(|| anyhow!("the language server is not active"))
    }

    fn workspace_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.context.workspace_root().join(path)
        }
    }
}

fn language_of(path: &Path) -> &str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("cs" | "csx") => LANGUAGE_ID,
        Some(other) => other,
        None => "plaintext",
    }
}

fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
