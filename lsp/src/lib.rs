//! Process launcher and language client for the C# language server.
//!
//! [`ServerSession`] is the entry point: it locates the server assembly,
//! probes the runtime, spawns `<runtime> <server> --debug` through a
//! [`ServerSpawner`], and drives a [`LanguageClient`] over Content-Length
//! framed JSON-RPC on the process' stdio.

mod client;
mod codec;
mod launcher;
mod probe;
mod protocol;
mod session;
mod state;
mod watcher;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{ClientError, ClientOptions, LanguageClient};
pub use codec::{CodecError, MAX_MESSAGE_BYTES, MessageReader, MessageWriter};
pub use launcher::{
    BoxedReader, BoxedWriter, DEBUG_FLAG, LaunchError, ProcessSpawner, ServerCommand,
    ServerLayout, ServerProcess, ServerSpawner,
};
pub use probe::{ProbeError, probe_runtime_version};
pub use protocol::{METHOD_NOT_FOUND, PathToUriError, path_to_file_uri};
pub use session::{ServerSession, SessionError};
pub use state::StateNotifier;
pub use watcher::{FileSyncWatcher, WatchError, WatchFilter};
