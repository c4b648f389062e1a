//! Workspace debug information: which projects exist and what they build.

use std::future::Future;
use std::path::Path;

use serde_json::json;
use thiserror::Error;

use csharp_host_lsp::{ClientError, LanguageClient, PathToUriError, path_to_file_uri};
use csharp_host_types::ProjectDebugConfiguration;

/// Request the language server answers with the workspace's projects.
pub const DEBUG_CONFIGURATION_REQUEST: &str = "workspace/debugConfiguration";

#[derive(Debug, Error)]
pub enum DebugInfoError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Uri(#[from] PathToUriError),
    #[error("workspace debug information unavailable: {message}")]
    Unavailable { message: String },
}

/// Source of per-project debug metadata for a workspace folder.
pub trait WorkspaceDebugInformationProvider: Send + Sync {
    fn workspace_debug_information(
        &self,
        folder: &Path,
    ) -> impl Future<Output = Result<Vec<ProjectDebugConfiguration>, DebugInfoError>> + Send;
}

/// Asks the running language server.
#[derive(Debug, Clone)]
pub struct LanguageServerDebugInformationProvider {
    client: LanguageClient,
}

impl LanguageServerDebugInformationProvider {
    #[must_use]
    pub fn new(client: LanguageClient) -> Self {
        Self { client }
    }
}

impl WorkspaceDebugInformationProvider for LanguageServerDebugInformationProvider {
    async fn workspace_debug_information(
        &self,
        folder: &Path,
    ) -> Result<Vec<ProjectDebugConfiguration>, DebugInfoError> {
        let uri = path_to_file_uri(folder)?;
        let projects: Option<Vec<ProjectDebugConfiguration>> = self
            .client
            .request(
                DEBUG_CONFIGURATION_REQUEST,
                Some(json!({ "workspacePath": uri.as_str() })),
            )
            .await?;
        let projects = projects.unwrap_or_default();
        tracing::debug!(count = projects.len(), "Workspace debug information received");
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use csharp_host_core::OutputChannel;
    use csharp_host_lsp::fake::FakeServer;
    use csharp_host_lsp::{ClientOptions, ServerCommand};

    use super::*;

    async fn client_for(server: &FakeServer, root: &Path) -> LanguageClient {
        let client = LanguageClient::new(ClientOptions::new(root), OutputChannel::new("test"));
        client
            .start(server, &ServerCommand::for_server("dotnet", Path::new("s.dll")))
            .await
            .unwrap();
        client
    }

    #[tokio::test]
    async fn requests_projects_for_workspace_uri() {
        let dir = tempfile::tempdir().unwrap();
        let server = FakeServer::new();
        server.respond_to(
            DEBUG_CONFIGURATION_REQUEST,
            json!([{
                "projectPath": dir.path().join("App.csproj"),
                "outputPath": dir.path().join("bin/App.dll"),
                "projectName": "App",
                "targetsDotnetCore": true,
                "isExe": true
            }]),
        );
        let provider = LanguageServerDebugInformationProvider::new(client_for(&server, dir.path()).await);

        let projects = provider.workspace_debug_information(dir.path()).await.unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].project_name, "App");
        let request = server.first(DEBUG_CONFIGURATION_REQUEST).unwrap();
        let expected = path_to_file_uri(dir.path()).unwrap();
        assert_eq!(request["params"]["workspacePath"], expected.as_str());
    }

    #[tokio::test]
    async fn null_result_means_no_projects() {
        let dir = tempfile::tempdir().unwrap();
        let server = FakeServer::new();
        server.respond_to(DEBUG_CONFIGURATION_REQUEST, serde_json::Value::Null);
        let provider = LanguageServerDebugInformationProvider::new(client_for(&server, dir.path()).await);

        assert!(provider.workspace_debug_information(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_without_handler_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let server = FakeServer::new();
        let provider = LanguageServerDebugInformationProvider::new(client_for(&server, dir.path()).await);

        let err = provider.workspace_debug_information(dir.path()).await.unwrap_err();
        assert!(matches!(err, DebugInfoError::Client(ClientError::Server { .. })));
    }
}
