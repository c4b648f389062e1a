//! Locating and spawning the language server process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use csharp_host_config::ServerSection;

/// Argument passed to the server after its assembly path.
pub const DEBUG_FLAG: &str = "--debug";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Cannot find language server in path '{}'", path.display())]
    ServerNotFound { path: PathBuf },
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("spawned server has no {0} pipe")]
    MissingStdio(&'static str),
}

/// Where the server assembly sits relative to the extension install directory.
///
/// `<install_dir>/../server/<namespace>/bin/<configuration>/<target>/<binary>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLayout {
    pub install_dir: PathBuf,
    pub namespace: String,
    pub configuration: String,
    pub target: String,
    pub binary: String,
}

impl ServerLayout {
    #[must_use]
    pub fn from_config(install_dir: PathBuf, server: &ServerSection) -> Self {
        Self {
            install_dir,
            namespace: server.namespace.clone(),
            configuration: server.configuration.clone(),
            target: server.target.clone(),
            binary: server.binary.clone(),
        }
    }

    #[must_use]
    pub fn server_path(&self) -> PathBuf {
        self.install_dir
            .join("..")
            .join("server")
            .join(&self.namespace)
            .join("bin")
            .join(&self.configuration)
            .join(&self.target)
            .join(&self.binary)
    }

    /// The server path, if a file exists there.
    pub fn locate(&self) -> Result<PathBuf, LaunchError> {
        let path = self.server_path();
        if path.is_file() {
            Ok(path)
        } else {
            Err(LaunchError::ServerNotFound { path })
        }
    }
}

/// Program and arguments for one server launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    /// `<runtime> <server_path> --debug`
    #[must_use]
    pub fn for_server(runtime: &str, server_path: &Path) -> Self {
        Self {
            program: runtime.to_string(),
            args: vec![
                server_path.to_string_lossy().into_owned(),
                DEBUG_FLAG.to_string(),
            ],
        }
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// The stdio ends of a started server.
pub struct ServerProcess {
    pub stdin: BoxedWriter,
    pub stdout: BoxedReader,
    pub stderr: Option<BoxedReader>,
    /// Absent for in-process transports.
    pub child: Option<Child>,
}

impl ServerProcess {
    #[must_use]
    pub fn from_streams(stdin: BoxedWriter, stdout: BoxedReader) -> Self {
        Self {
            stdin,
            stdout,
            stderr: None,
            child: None,
        }
    }
}

impl fmt::Debug for ServerProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerProcess")
            .field("pid", &self.child.as_ref().and_then(Child::id))
            .field("stderr", &self.stderr.is_some())
            .finish_non_exhaustive()
    }
}

/// Turns a [`ServerCommand`] into a running server.
pub trait ServerSpawner: Send + Sync {
    fn spawn(&self, command: &ServerCommand) -> Result<ServerProcess, LaunchError>;
}

/// Spawns the server as a child process with piped stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

impl ServerSpawner for ProcessSpawner {
    fn spawn(&self, command: &ServerCommand) -> Result<ServerProcess, LaunchError> {
        // Resolve through PATH up front so the error names the program, not the OS.
        let program = which::which(&command.program)
            .unwrap_or_else(|_| PathBuf::from(&command.program));

        let mut cmd = Command::new(&program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        tracing::info!(pid = ?child.id(), command = %command, "Spawned language server");

        let stdin = child.stdin.take().ok_or(LaunchError::MissingStdio("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(LaunchError::MissingStdio("stdout"))?;
        let stderr = child.stderr.take();

        Ok(ServerProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: stderr.map(|s| Box::new(s) as BoxedReader),
            child: Some(child),
        })
    }
}
