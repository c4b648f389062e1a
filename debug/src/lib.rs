//! Debug session bridge.
//!
//! Once the language server reports `Running`, the workspace's executable
//! project gets a `build` task and a `coreclr` launch configuration. The
//! bridge also registers the `coreclr` configuration provider and the
//! `dotnet.generateAssets` command with the host.

mod assets;
mod bridge;
mod configuration;
mod provider;

pub use assets::{
    ATTACH_CONFIGURATION_NAME, AssetStatus, AssetsError, AssetsOutcome, LAUNCH_CONFIGURATION_NAME,
    LAUNCH_FILE, TASKS_FILE, VSCODE_DIR, add_assets_if_necessary, attach_configuration,
    build_tasks, executable_projects, generate_assets, launch_configuration,
};
pub use bridge::{BridgeError, BridgeOptions, register_debugger, register_debugger_with};
pub use configuration::CSharpConfigurationProvider;
pub use provider::{
    DEBUG_CONFIGURATION_REQUEST, DebugInfoError, LanguageServerDebugInformationProvider,
    WorkspaceDebugInformationProvider,
};
