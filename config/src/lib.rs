//! Configuration for csharp-host.
//!
//! Loaded from `~/.csharp-host/config.toml` (or an explicit path). Every key is
//! optional; the defaults reproduce the fixed launch layout the server ships with.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use csharp_host_types::{DEFAULT_WATCH_GLOB, DocumentSelector, SERVER_NAME};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "CSHARP_HOST_CONFIG";

const fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub debug: DebugSection,
}

/// Where the server lives and how it is run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Runtime executable used to host the server assembly.
    pub runtime: String,
    /// Extension install directory. The server is looked up relative to it.
    /// Defaults to the directory holding the running executable.
    pub install_dir: Option<PathBuf>,
    pub namespace: String,
    /// Build configuration segment of the server path (e.g. `Debug`).
    pub configuration: String,
    /// Target framework segment of the server path (e.g. `net7.0`).
    pub target: String,
    pub binary: String,
    pub request_timeout_secs: u64,
    /// How long `stop` waits for the process to exit after `exit`.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            runtime: "dotnet".to_string(),
            install_dir: None,
            namespace: SERVER_NAME.to_string(),
            configuration: "Debug".to_string(),
            target: "net7.0".to_string(),
            binary: format!("{SERVER_NAME}.dll"),
            request_timeout_secs: 30,
            shutdown_grace_secs: 2,
        }
    }
}

impl ServerSection {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Install directory with `${VAR}` references expanded.
    #[must_use]
    pub fn install_dir(&self) -> Option<PathBuf> {
        self.install_dir
            .as_ref()
            .map(|dir| PathBuf::from(expand_env_vars(&dir.to_string_lossy())))
    }
}

/// Document and filesystem synchronization.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub document_selector: DocumentSelector,
    /// Glob (relative to the workspace root) of file changes sent to the server.
    pub watch_glob: String,
    pub debounce_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            document_selector: DocumentSelector::default(),
            watch_glob: DEFAULT_WATCH_GLOB.to_string(),
            debounce_ms: 200,
        }
    }
}

impl SyncSection {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebugSection {
    /// Reconcile `tasks.json`/`launch.json` every time the server reaches `Running`.
    #[serde(default = "default_true")]
    pub generate_assets: bool,
}

impl Default for DebugSection {
    fn default() -> Self {
        Self {
            generate_assets: true,
        }
    }
}

impl HostConfig {
    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Self::parse(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Per-user state directory (`~/.csharp-host`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".csharp-host"))
}

/// Config file location: `$CSHARP_HOST_CONFIG`, else `~/.csharp-host/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Expand `${VAR}` references. Unset variables expand to nothing; an
/// unterminated `${` is kept as-is.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if !name.is_empty() {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
