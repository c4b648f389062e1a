//! `.vscode/tasks.json` and `.vscode/launch.json` for the workspace's executable project.
//!
//! Both files are read as JSON with comments and rewritten only when their
//! content actually changes, so a file the user has annotated is left alone
//! until something needs adding.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use csharp_host_types::{
    DEBUGGER_TYPE, DebugConfiguration, ProjectDebugConfiguration, WORKSPACE_FOLDER_VAR,
};
use csharp_host_utils::{from_jsonc_str, write_if_changed};

use crate::provider::{DebugInfoError, WorkspaceDebugInformationProvider};

pub const VSCODE_DIR: &str = ".vscode";
pub const TASKS_FILE: &str = "tasks.json";
pub const LAUNCH_FILE: &str = "launch.json";

const TASKS_VERSION: &str = "2.0.0";
const LAUNCH_VERSION: &str = "0.2.0";
const BUILD_TASK: &str = "build";
pub const LAUNCH_CONFIGURATION_NAME: &str = ".NET Core Launch (console)";
pub const ATTACH_CONFIGURATION_NAME: &str = ".NET Core Attach";

#[derive(Debug, Error)]
pub enum AssetsError {
    #[error(transparent)]
    DebugInfo(#[from] DebugInfoError),
    #[error("no executable project found in the workspace")]
    NoExecutableProject,
    #[error("no executable project at index {index} ({available} available)")]
    SelectionOutOfRange { index: usize, available: usize },
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{} does not contain a JSON object", path.display())]
    NotAnObject { path: PathBuf },
    #[error("failed to encode debug configuration '{name}': {source}")]
    Encode {
        name: String,
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// What happened to one asset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetsOutcome {
    /// Project the assets were generated for; `None` when there was nothing to do.
    pub project: Option<String>,
    pub tasks: AssetStatus,
    pub launch: AssetStatus,
}

impl AssetsOutcome {
    fn untouched() -> Self {
        Self {
            project: None,
            tasks: AssetStatus::Unchanged,
            launch: AssetStatus::Unchanged,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.tasks != AssetStatus::Unchanged || self.launch != AssetStatus::Unchanged
    }
}

/// How generated entries meet entries already in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    /// Add only when the file has no equivalent entry.
    AddMissing,
    /// Replace entries with the same label or name, keep the rest.
    Replace,
}

/// Add build tasks and a launch configuration if the workspace has none.
///
/// Safe to run repeatedly; a second run reports both files `Unchanged`.
pub async fn add_assets_if_necessary<P>(
    workspace_root: &Path,
    provider: &P,
) -> Result<AssetsOutcome, AssetsError>
where
    P: WorkspaceDebugInformationProvider + ?Sized,
{
    let projects = provider.workspace_debug_information(workspace_root).await?;
    let Some(project) = executable_projects(&projects).next() else {
        tracing::info!("No executable project in workspace; skipping asset generation");
        return Ok(AssetsOutcome::untouched());
    };
    write_assets(workspace_root, project, Merge::AddMissing)
}

/// Generate assets for the executable project at `selection` (default 0).
pub async fn generate_assets<P>(
    workspace_root: &Path,
    provider: &P,
    selection: Option<usize>,
) -> Result<AssetsOutcome, AssetsError>
where
    P: WorkspaceDebugInformationProvider + ?Sized,
{
    let projects = provider.workspace_debug_information(workspace_root).await?;
    let executables: Vec<&ProjectDebugConfiguration> = executable_projects(&projects).collect();
    if executables.is_empty() {
        return Err(AssetsError::NoExecutableProject);
    }
    let index = selection.unwrap_or(0);
    let project = executables
        .get(index)
        .ok_or(AssetsError::SelectionOutOfRange {
            index,
            available: executables.len(),
        })?;
    write_assets(workspace_root, project, Merge::Replace)
}

pub fn executable_projects(
    projects: &[ProjectDebugConfiguration],
) -> impl Iterator<Item = &ProjectDebugConfiguration> {
    projects.iter().filter(|project| project.is_exe)
}

/// The `launch` configuration for `project`, with paths relative to the workspace.
#[must_use]
pub fn launch_configuration(
    workspace_root: &Path,
    project: &ProjectDebugConfiguration,
) -> DebugConfiguration {
    DebugConfiguration::new(LAUNCH_CONFIGURATION_NAME, DEBUGGER_TYPE, "launch")
        .with("preLaunchTask", BUILD_TASK)
        .with("program", workspace_relative(workspace_root, &project.output_path))
        .with("args", json!([]))
        .with("cwd", WORKSPACE_FOLDER_VAR)
        .with("console", "internalConsole")
        .with("stopAtEntry", false)
}

#[must_use]
pub fn attach_configuration() -> DebugConfiguration {
    DebugConfiguration::new(ATTACH_CONFIGURATION_NAME, DEBUGGER_TYPE, "attach")
}

/// The launch and attach entries written to `launch.json`, as JSON.
fn generated_configurations(
    workspace_root: &Path,
    project: &ProjectDebugConfiguration,
) -> Result<Vec<Value>, AssetsError> {
    [launch_configuration(workspace_root, project), attach_configuration()]
        .iter()
        .map(|config| {
            serde_json::to_value(config).map_err(|source| AssetsError::Encode {
                name: config.name.clone(),
                source,
            })
        })
        .collect()
}

/// `build`, `publish` and `watch` tasks for `project`.
#[must_use]
pub fn build_tasks(workspace_root: &Path, project: &ProjectDebugConfiguration) -> Vec<Value> {
    let project_file = workspace_relative(workspace_root, &project.project_path);
    let msbuild_args = |verb: &str| {
        json!([
            verb,
            project_file,
            "/property:GenerateFullPaths=true",
            "/consoleloggerparameters:NoSummary"
        ])
    };
    vec![
        task(BUILD_TASK, msbuild_args("build")),
        task("publish", msbuild_args("publish")),
        task("watch", json!(["watch", "run", "--project", project_file])),
    ]
}

fn task(label: &str, args: Value) -> Value {
    json!({
        "label": label,
        "command": "dotnet",
        "type": "process",
        "args": args,
        "problemMatcher": "$msCompile"
    })
}

/// `${workspaceFolder}/<relative>` for paths inside the workspace, the path itself otherwise.
fn workspace_relative(workspace_root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(workspace_root) else {
        return path.to_string_lossy().into_owned();
    };
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        WORKSPACE_FOLDER_VAR.to_string()
    } else {
        format!("{WORKSPACE_FOLDER_VAR}/{}", parts.join("/"))
    }
}

fn write_assets(
    workspace_root: &Path,
    project: &ProjectDebugConfiguration,
    merge: Merge,
) -> Result<AssetsOutcome, AssetsError> {
    let vscode = workspace_root.join(VSCODE_DIR);

    let tasks_path = vscode.join(TASKS_FILE);
    let tasks = update_document(&tasks_path, TASKS_VERSION, |doc| {
        edit_entries(doc, "tasks", |existing| {
            merge_entries(
                existing,
                build_tasks(workspace_root, project),
                "label",
                merge,
                |entry| has_key(entry, "label", BUILD_TASK),
            );
        });
    })?;

    let launch_path = vscode.join(LAUNCH_FILE);
    let configurations = generated_configurations(workspace_root, project)?;
    let launch = update_document(&launch_path, LAUNCH_VERSION, |doc| {
        edit_entries(doc, "configurations", |existing| {
            merge_entries(existing, configurations, "name", merge, |entry| {
                has_key(entry, "type", DEBUGGER_TYPE)
            });
        });
    })?;

    tracing::info!(
        project = %project.project_name,
        %tasks,
        %launch,
        "Workspace assets reconciled"
    );
    Ok(AssetsOutcome {
        project: Some(project.project_name.clone()),
        tasks,
        launch,
    })
}

fn has_key(entry: &Value, key: &str, expected: &str) -> bool {
    entry.get(key).and_then(Value::as_str) == Some(expected)
}

/// Run `edit` on the array under `key`, creating it (or resetting a non-array) first.
fn edit_entries(doc: &mut Map<String, Value>, key: &str, edit: impl FnOnce(&mut Vec<Value>)) {
    let mut items = match doc.remove(key) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            tracing::warn!(key, "Replacing non-array entry list");
            Vec::new()
        }
        None => Vec::new(),
    };
    edit(&mut items);
    doc.insert(key.to_string(), Value::Array(items));
}

fn merge_entries(
    existing: &mut Vec<Value>,
    generated: Vec<Value>,
    identity: &str,
    merge: Merge,
    already_configured: impl Fn(&Value) -> bool,
) {
    if merge == Merge::AddMissing && existing.iter().any(already_configured) {
        return;
    }
    for entry in generated {
        let id = entry.get(identity).cloned();
        let position = existing
            .iter()
            .position(|item| id.is_some() && item.get(identity) == id.as_ref());
        match (position, merge) {
            (Some(index), Merge::Replace) => existing[index] = entry,
            (Some(_), Merge::AddMissing) => {}
            (None, _) => existing.push(entry),
        }
    }
}

/// Read, edit and (if the content changed) write one asset file.
fn update_document(
    path: &Path,
    version: &str,
    edit: impl FnOnce(&mut Map<String, Value>),
) -> Result<AssetStatus, AssetsError> {
    let original = read_document(path)?;
    let existed = original.is_some();
    let original = original.unwrap_or_default();

    let mut doc = original.clone();
    doc.entry("version".to_string())
        .or_insert_with(|| Value::String(version.to_string()));
    edit(&mut doc);

    if existed && doc == original {
        return Ok(AssetStatus::Unchanged);
    }

    let mut text = serde_json::to_string_pretty(&Value::Object(doc)).map_err(|source| {
        AssetsError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    text.push('\n');
    let written = write_if_changed(path, text.as_bytes()).map_err(|source| AssetsError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(match (written, existed) {
        (false, _) => AssetStatus::Unchanged,
        (true, false) => AssetStatus::Created,
        (true, true) => AssetStatus::Updated,
    })
}

fn read_document(path: &Path) -> Result<Option<Map<String, Value>>, AssetsError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AssetsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if text.trim().is_empty() {
        return Ok(Some(Map::new()));
    }
    match from_jsonc_str::<Value>(&text) {
        Ok(Value::Object(doc)) => Ok(Some(doc)),
        Ok(_) => Err(AssetsError::NotAnObject {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(AssetsError::Parse {
            path: path.to_path_buf(),
            source,
        }),
    }
}
