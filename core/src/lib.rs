//! Host model for csharp-host.
//!
//! The pieces an editor host would normally provide to an extension, reduced
//! to what the activation glue needs: an [`ExtensionContext`] owning the
//! extension's [`Subscriptions`], a shared [`OutputChannel`], and the command
//! and debug-configuration registries.

mod commands;
mod context;
mod debug_providers;
mod disposable;
mod output;

pub use commands::{CommandError, CommandFut, CommandHandler, CommandRegistry};
pub use context::{ExtensionContext, Host};
pub use debug_providers::{
    DebugConfigurationProvider, DebugConfigurationProviderRegistry, ProviderError, ProviderFut,
};
pub use disposable::{Disposable, Subscriptions};
pub use output::OutputChannel;
