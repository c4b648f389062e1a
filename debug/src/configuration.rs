//! `coreclr` debug configuration provider.

use std::path::Path;
use std::sync::Arc;

use csharp_host_core::{DebugConfigurationProvider, ProviderError, ProviderFut};
use csharp_host_types::{DEBUGGER_TYPE, DebugConfiguration, WORKSPACE_FOLDER_VAR};

use crate::assets::{executable_projects, launch_configuration};
use crate::provider::WorkspaceDebugInformationProvider;

/// Supplies and completes `coreclr` launch configurations from workspace debug information.
pub struct CSharpConfigurationProvider<P> {
    information: Arc<P>,
}

impl<P> CSharpConfigurationProvider<P> {
    #[must_use]
    pub fn new(information: Arc<P>) -> Self {
        Self { information }
    }
}

impl<P: WorkspaceDebugInformationProvider> CSharpConfigurationProvider<P> {
    async fn first_launch_configuration(
        &self,
        folder: &Path,
    ) -> Result<Option<DebugConfiguration>, ProviderError> {
        let projects = self
            .information
            .workspace_debug_information(folder)
            .await
            .map_err(unavailable)?;
        Ok(executable_projects(&projects)
            .next()
            .map(|project| launch_configuration(folder, project)))
    }
}

fn unavailable(err: impl std::fmt::Display) -> ProviderError {
    ProviderError::WorkspaceInformation {
        message: err.to_string(),
    }
}

/// Fill in the `coreclr` keys a hand-written configuration may leave out.
fn apply_coreclr_defaults(config: &mut DebugConfiguration) {
    config.set_default("cwd", WORKSPACE_FOLDER_VAR);
    config.set_default("console", "internalConsole");
    config.set_default("stopAtEntry", false);
}

impl<P: WorkspaceDebugInformationProvider> DebugConfigurationProvider
    for CSharpConfigurationProvider<P>
{
    fn provide_debug_configurations<'a>(
        &'a self,
        folder: &'a Path,
    ) -> ProviderFut<'a, Vec<DebugConfiguration>> {
        Box::pin(async move {
            let projects = self
                .information
                .workspace_debug_information(folder)
                .await
                .map_err(unavailable)?;
            Ok(executable_projects(&projects)
                .map(|project| launch_configuration(folder, project))
                .collect())
        })
    }

    fn resolve_debug_configuration<'a>(
        &'a self,
        folder: &'a Path,
        mut config: DebugConfiguration,
    ) -> ProviderFut<'a, Option<DebugConfiguration>> {
        Box::pin(async move {
            if config.is_empty() {
                let resolved = self.first_launch_configuration(folder).await?;
                if resolved.is_none() {
                    tracing::warn!("No executable project to launch; debug session aborted");
                }
                return Ok(resolved);
            }
            if config.debug_type == DEBUGGER_TYPE {
                apply_coreclr_defaults(&mut config);
            }
            Ok(Some(config))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use csharp_host_types::ProjectDebugConfiguration;

    use super::*;
    use crate::provider::DebugInfoError;

    struct Projects(Result<Vec<ProjectDebugConfiguration>, String>);

    impl WorkspaceDebugInformationProvider for Projects {
        async fn workspace_debug_information(
            &self,
            _folder: &Path,
        ) -> Result<Vec<ProjectDebugConfiguration>, DebugInfoError> {
            self.0
                .clone()
                .map_err(|message| DebugInfoError::Unavailable { message })
        }
    }

    fn exe(name: &str) -> ProjectDebugConfiguration {
        ProjectDebugConfiguration {
            project_path: PathBuf::from(format!("/ws/{name}/{name}.csproj")),
            output_path: PathBuf::from(format!("/ws/{name}/bin/{name}.dll")),
            project_name: name.to_string(),
            targets_dotnet_core: true,
            is_exe: true,
            solution_path: None,
        }
    }

    fn provider(projects: Vec<ProjectDebugConfiguration>) -> CSharpConfigurationProvider<Projects> {
        CSharpConfigurationProvider::new(Arc::new(Projects(Ok(projects))))
    }

    #[tokio::test]
    async fn provides_one_launch_configuration_per_executable() {
        let mut library = exe("Lib");
        library.is_exe = false;
        let provider = provider(vec![exe("App"), library, exe("Tool")]);

        let configs = provider
            .provide_debug_configurations(Path::new("/ws"))
            .await
            .unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].get("program"), Some(&json!("${workspaceFolder}/Tool/bin/Tool.dll")));
    }

    #[tokio::test]
    async fn empty_configuration_becomes_first_launch_configuration() {
        let provider = provider(vec![exe("App"), exe("Tool")]);

        let resolved = provider
            .resolve_debug_configuration(Path::new("/ws"), DebugConfiguration::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.debug_type, "coreclr");
        assert_eq!(resolved.request, "launch");
        assert_eq!(resolved.get("program"), Some(&json!("${workspaceFolder}/App/bin/App.dll")));
    }

    #[tokio::test]
    async fn empty_configuration_without_executable_aborts() {
        let provider = provider(Vec::new());
        let resolved = provider
            .resolve_debug_configuration(Path::new("/ws"), DebugConfiguration::default())
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn coreclr_configuration_gets_missing_defaults_only() {
        let provider = provider(Vec::new());
        let config = DebugConfiguration::new("Mine", "coreclr", "launch").with("stopAtEntry", true);

        let resolved = provider
            .resolve_debug_configuration(Path::new("/ws"), config)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.get("cwd"), Some(&json!("${workspaceFolder}")));
        assert_eq!(resolved.get("console"), Some(&json!("internalConsole")));
        assert_eq!(resolved.get("stopAtEntry"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn other_debuggers_pass_through() {
        let provider = provider(Vec::new());
        let config = DebugConfiguration::new("Node", "node", "launch");
        let resolved = provider
            .resolve_debug_configuration(Path::new("/ws"), config.clone())
            .await
            .unwrap();
        assert_eq!(resolved, Some(config));
    }

    #[tokio::test]
    async fn information_failure_is_provider_error() {
        let provider =
            CSharpConfigurationProvider::new(Arc::new(Projects(Err("server not running".into()))));
        let err = provider
            .provide_debug_configurations(Path::new("/ws"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::WorkspaceInformation { ref message } if message.contains("server not running")));
    }
}
