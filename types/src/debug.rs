//! Workspace debug information and debug configuration entries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Debug-relevant metadata for one project, as reported by the language server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDebugConfiguration {
    /// Absolute path to the project file (e.g. `.csproj`).
    pub project_path: PathBuf,
    /// Absolute path to the built assembly.
    pub output_path: PathBuf,
    pub project_name: String,
    pub targets_dotnet_core: bool,
    /// Whether the project produces an executable (only these are launchable).
    pub is_exe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_path: Option<PathBuf>,
}

/// One entry of `launch.json`.
///
/// The well-known keys are typed; every other key is kept verbatim in
/// `extra` so user edits survive a read-modify-write cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugConfiguration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub debug_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DebugConfiguration {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        debug_type: impl Into<String>,
        request: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            debug_type: debug_type.into(),
            request: request.into(),
            extra: Map::new(),
        }
    }

    /// Builder-style setter for an extra key.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// A configuration with no `type`, `request` or `name`.
    ///
    /// The host hands these over when the user starts debugging without a
    /// `launch.json`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.debug_type.is_empty() && self.request.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Insert `value` under `key` unless the key is already present.
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        self.extra
            .entry(key.to_string())
            .or_insert_with(|| value.into());
    }
}
