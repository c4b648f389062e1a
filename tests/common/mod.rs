//! Shared test utilities and fixtures
//!
//! A temporary extension install with a server binary in the expected layout,
//! a workspace next to it, and a config that keeps the tests hermetic.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};

use csharp_host::Extension;
use csharp_host_config::HostConfig;
use csharp_host_debug::DEBUG_CONFIGURATION_REQUEST;
use csharp_host_lsp::ServerLayout;
use csharp_host_lsp::fake::FakeServer;

/// Runtime name that resolves to nothing, so the version probe fails fast.
pub const TEST_RUNTIME: &str = "csharp-host-test-runtime";

pub struct Fixture {
    _dir: tempfile::TempDir,
    pub extension_dir: PathBuf,
    pub workspace: PathBuf,
    pub server_path: PathBuf,
    pub config: HostConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let extension_dir = root.join("extension");
        let workspace = root.join("workspace");
        fs::create_dir_all(&extension_dir).unwrap();
        fs::create_dir_all(&workspace).unwrap();

        let mut config = HostConfig::default();
        config.server.runtime = TEST_RUNTIME.to_string();
        config.server.shutdown_grace_secs = 0;

        let server_path = ServerLayout::from_config(extension_dir.clone(), &config.server).server_path();
        fs::create_dir_all(server_path.parent().unwrap()).unwrap();
        fs::write(&server_path, b"").unwrap();

        Self {
            _dir: dir,
            extension_dir,
            workspace,
            server_path,
            config,
        }
    }

    pub fn extension(&self) -> Extension {
        Extension::new(
            self.extension_dir.clone(),
            self.workspace.clone(),
            self.config.clone(),
        )
    }

    pub fn vscode_file(&self, name: &str) -> PathBuf {
        self.workspace.join(".vscode").join(name)
    }

    pub fn read_json(&self, name: &str) -> Value {
        let text = fs::read_to_string(self.vscode_file(name)).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

/// Project entry as the server reports it for `workspace/debugConfiguration`.
pub fn project(workspace: &Path, name: &str, is_exe: bool) -> Value {
    json!({
        "projectPath": workspace.join(name).join(format!("{name}.csproj")),
        "outputPath": workspace.join(name).join("bin").join("Debug").join(format!("{name}.dll")),
        "projectName": name,
        "targetsDotnetCore": true,
        "isExe": is_exe
    })
}

/// A fake server that reports `projects` for the workspace.
pub fn server_with_projects(projects: Vec<Value>) -> FakeServer {
    let server = FakeServer::new();
    server.respond_to(DEBUG_CONFIGURATION_REQUEST, Value::Array(projects));
    server
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
