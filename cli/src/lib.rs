//! csharp-host: runs the C# language server and keeps the workspace's
//! debugger assets in step with it.

mod commands;
mod extension;

pub use commands::{CommandParseError, HostCommand};
pub use extension::{CommandOutput, Extension};
