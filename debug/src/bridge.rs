//! Wires the debugger support into the host once the language client exists.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use csharp_host_core::{CommandError, ExtensionContext, ProviderError};
use csharp_host_lsp::{LanguageClient, StateNotifier};
use csharp_host_types::{DEBUGGER_TYPE, GENERATE_ASSETS_COMMAND};

use crate::assets::{add_assets_if_necessary, generate_assets};
use crate::configuration::CSharpConfigurationProvider;
use crate::provider::{LanguageServerDebugInformationProvider, WorkspaceDebugInformationProvider};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy)]
pub struct BridgeOptions {
    /// Ensure `tasks.json`/`launch.json` each time the server reaches `Running`.
    pub ensure_assets: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            ensure_assets: true,
        }
    }
}

/// Register the debugger integration backed by `client`.
///
/// Pushes the state listener, the `coreclr` configuration provider and the
/// generate-assets command onto the context's subscriptions.
pub fn register_debugger(
    context: &mut ExtensionContext,
    client: &LanguageClient,
    options: BridgeOptions,
) -> Result<(), BridgeError> {
    let information = Arc::new(LanguageServerDebugInformationProvider::new(client.clone()));
    register_debugger_with(context, client.state_notifier(), information, options)
}

/// [`register_debugger`] over any state source and information provider.
pub fn register_debugger_with<P>(
    context: &mut ExtensionContext,
    states: &StateNotifier,
    information: Arc<P>,
    options: BridgeOptions,
) -> Result<(), BridgeError>
where
    P: WorkspaceDebugInformationProvider + 'static,
{
    let root: PathBuf = context.workspace_root().to_path_buf();

    if options.ensure_assets {
        let information = Arc::clone(&information);
        let root = root.clone();
        let listener = states.on_change(move |change| {
            let information = Arc::clone(&information);
            let root = root.clone();
            async move {
                if !change.new_state.is_running() {
                    return;
                }
                match add_assets_if_necessary(&root, information.as_ref()).await {
                    Ok(outcome) if outcome.changed() => tracing::info!(?outcome, "Debug assets updated"),
                    Ok(_) => tracing::debug!("Debug assets already present"),
                    Err(e) => tracing::warn!("Could not ensure debug assets: {e}"),
                }
            }
        });
        context.subscribe(listener);
    }

    let provider = Arc::new(CSharpConfigurationProvider::new(Arc::clone(&information)));
    let registration = context
        .host()
        .debug_providers
        .register(DEBUGGER_TYPE, provider)?;
    context.subscribe(registration);

    let command = context.host().commands.register(
        GENERATE_ASSETS_COMMAND,
        move |args: Vec<Value>| {
            let information = Arc::clone(&information);
            let root = root.clone();
            async move {
                let selection = selection_arg(&args)?;
                let outcome = generate_assets(&root, information.as_ref(), selection)
                    .await
                    .map_err(|e| CommandError::Failed {
                        name: GENERATE_ASSETS_COMMAND.to_string(),
                        message: e.to_string(),
                    })?;
                serde_json::to_value(outcome).map_err(|e| CommandError::Failed {
                    name: GENERATE_ASSETS_COMMAND.to_string(),
                    message: e.to_string(),
                })
            }
        },
    )?;
    context.subscribe(command);

    Ok(())
}

/// Optional first argument: index of the executable project.
fn selection_arg(args: &[Value]) -> Result<Option<usize>, CommandError> {
    match args.first() {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|index| Some(index as usize))
            .ok_or_else(|| CommandError::BadArgs {
                message: format!("expected a project index, got {value}"),
            }),
    }
}
