//! Shared infrastructure utilities for csharp-host.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`jsonc`**: Reading editor JSON files that carry comments and trailing commas

pub mod atomic_write;
pub mod jsonc;

pub use atomic_write::{AtomicWriteOptions, FileSyncPolicy, atomic_write, atomic_write_with_options, write_if_changed};
pub use jsonc::{from_jsonc_str, strip_jsonc};
