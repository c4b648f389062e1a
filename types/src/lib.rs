//! Core domain types for csharp-host.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod debug;
mod document;
mod state;

pub use debug::{DebugConfiguration, ProjectDebugConfiguration};
pub use document::{DocumentSelector, FileChangeType, FileEvent, TextDocument};
pub use state::{ServerState, StateChange};

// ============================================================================
// Well-known identifiers
// ============================================================================

/// Display name of the language server; also names the output channel.
pub const SERVER_NAME: &str = "Microsoft.CodeAnalysis.LanguageServer";

/// Identifier the client announces for itself.
pub const CLIENT_ID: &str = "microsoft-codeanalysis-languageserver";

/// Language identifier the client synchronizes documents for.
pub const LANGUAGE_ID: &str = "csharp";

/// Debugger type the configuration provider is registered for.
pub const DEBUGGER_TYPE: &str = "coreclr";

/// Host command that (re)generates `tasks.json` and `launch.json`.
pub const GENERATE_ASSETS_COMMAND: &str = "dotnet.generateAssets";

/// Glob of filesystem changes forwarded to the server.
pub const DEFAULT_WATCH_GLOB: &str = "**/*.*";

/// Placeholder the editor substitutes with the workspace folder path.
pub const WORKSPACE_FOLDER_VAR: &str = "${workspaceFolder}";
