//! Runtime version probe run before the server is launched.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run '{runtime} --version': {source}")]
    Spawn {
        runtime: String,
        source: std::io::Error,
    },
    #[error("'{runtime} --version' exited with {status}")]
    ExitStatus { runtime: String, status: String },
    #[error("'{runtime} --version' wrote to stderr: {stderr}")]
    Stderr { runtime: String, stderr: String },
}

/// Run `<runtime> --version` in `cwd` and return the trimmed version string.
///
/// Any stderr output counts as failure, even with a zero exit status.
pub async fn probe_runtime_version(runtime: &str, cwd: &Path) -> Result<String, ProbeError> {
    let output = Command::new(runtime)
        .arg("--version")
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ProbeError::Spawn {
            runtime: runtime.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::ExitStatus {
            runtime: runtime.to_string(),
            status: output.status.to_string(),
        });
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return Err(ProbeError::Stderr {
            runtime: runtime.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
