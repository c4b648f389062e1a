//! Atomic file write helpers.
//!
//! Uses a temp file + rename pattern. On Windows, rename-over-existing fails, so we
//! use a backup-and-restore fallback to avoid data loss when overwriting.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncPolicy {
    SyncAll,
    SkipSync,
}

#[derive(Debug, Clone, Copy)]
pub struct AtomicWriteOptions {
    /// File sync policy for the temp file before persisting.
    pub file_sync: FileSyncPolicy,
    /// Create missing parent directories (e.g. `.vscode/`) before writing.
    pub create_parent_dirs: bool,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            file_sync: FileSyncPolicy::SyncAll,
            create_parent_dirs: true,
        }
    }
}

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write_with_options(path, bytes, AtomicWriteOptions::default())
}

/// Write `bytes` unless the file already holds exactly them.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<bool> {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(existing) if existing == bytes => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    atomic_write(path, bytes)?;
    Ok(true)
}

pub fn atomic_write_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if options.create_parent_dirs {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if matches!(options.file_sync, FileSyncPolicy::SyncAll) {
        tmp.as_file().sync_all()?;
    }

    let Err(err) = tmp.persist(path) else {
        return Ok(());
    };
    if !path.exists() {
        return Err(err.error);
    }

    // Windows fallback: move the old file aside, persist, then drop the backup.
    let backup_path = path.with_extension("bak");
    let _ = fs::remove_file(&backup_path);
    fs::rename(path, &backup_path)?;

    if let Err(rename_err) = err.file.persist(path) {
        let _ = fs::rename(&backup_path, path);
        return Err(rename_err.error);
    }
    if let Err(e) = fs::remove_file(&backup_path) {
        tracing::warn!(
            path = %backup_path.display(),
            "Failed to remove .bak after atomic write: {e}"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn atomic_write_overwrites_existing_and_cleans_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tasks.json");
        let opts = AtomicWriteOptions {
            file_sync: FileSyncPolicy::SkipSync,
            create_parent_dirs: false,
        };

        atomic_write_with_options(&path, b"one", opts).expect("write one");
        atomic_write_with_options(&path, b"two", opts).expect("write two");

        assert_eq!(fs::read_to_string(&path).expect("read"), "two");
        assert!(!path.with_extension("bak").exists());
    }

    #[test]
    fn atomic_write_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".vscode").join("launch.json");

        atomic_write(&path, b"{}").expect("write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "{}");
    }

    #[test]
    fn write_if_changed_skips_identical_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("launch.json");

        assert!(write_if_changed(&path, b"{}").expect("first"));
        assert!(!write_if_changed(&path, b"{}").expect("second"));
        assert!(write_if_changed(&path, b"{ }").expect("third"));
    }
}
