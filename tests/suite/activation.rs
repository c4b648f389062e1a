//! Extension activation and deactivation end to end

use csharp_host_lsp::{LaunchError, SessionError};
use csharp_host_types::{GENERATE_ASSETS_COMMAND, SERVER_NAME, ServerState};

use crate::common::{Fixture, eventually, project, server_with_projects};

#[tokio::test]
async fn activation_launches_server_and_writes_assets_once_running() {
    let fx = Fixture::new();
    let server = server_with_projects(vec![project(&fx.workspace, "App", true)]);
    let mut extension = fx.extension();

    extension.activate(&server).await.unwrap();

    let spawned = server.spawned_commands();
    assert_eq!(spawned.len(), 1);
    assert_eq!(
        spawned[0].args,
        [fx.server_path.to_string_lossy().into_owned(), "--debug".to_string()]
    );
    assert_eq!(extension.client().unwrap().state(), ServerState::Running);
    assert!(eventually(|| fx.vscode_file("launch.json").is_file()).await);
    assert!(eventually(|| fx.vscode_file("tasks.json").is_file()).await);

    let launch = fx.read_json("launch.json");
    assert_eq!(launch["version"], "0.2.0");
    assert_eq!(
        launch["configurations"][0]["program"],
        "${workspaceFolder}/App/bin/Debug/App.dll"
    );
    let tasks = fx.read_json("tasks.json");
    assert_eq!(tasks["tasks"][0]["label"], "build");

    extension.deactivate().await.unwrap();
}

#[tokio::test]
async fn activation_registers_in_order_and_deactivation_releases_everything() {
    let fx = Fixture::new();
    let server = server_with_projects(Vec::new());
    let mut extension = fx.extension();

    extension.activate(&server).await.unwrap();
    let labels: Vec<String> = extension
        .context()
        .subscriptions
        .labels()
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(
        labels[..3],
        [
            "state-listener",
            "debug-provider:coreclr",
            "command:dotnet.generateAssets"
        ]
    );
    assert_eq!(extension.session().output().name(), SERVER_NAME);

    extension.deactivate().await.unwrap();

    assert!(server.wait_for("exit", 1).await);
    assert_eq!(server.count("shutdown"), 1);
    assert!(extension.client().is_none());
    assert!(extension.context().subscriptions.is_empty());
    assert!(!extension.context().host().commands.contains(GENERATE_ASSETS_COMMAND));

    // A second deactivation has nothing left to do.
    extension.deactivate().await.unwrap();
    assert_eq!(server.count("shutdown"), 1);
}

#[tokio::test]
async fn missing_server_binary_aborts_activation() {
    let fx = Fixture::new();
    std::fs::remove_file(&fx.server_path).unwrap();
    let server = server_with_projects(Vec::new());
    let mut extension = fx.extension();

    let err = extension.activate(&server).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::Launch(LaunchError::ServerNotFound { .. }))
    ));
    assert!(format!("{err:#}").contains("Cannot find language server in path"));
    assert_eq!(server.spawn_count(), 0);
    assert!(!fx.vscode_file("launch.json").exists());
}

#[tokio::test]
async fn disabled_asset_generation_leaves_workspace_alone() {
    let mut fx = Fixture::new();
    fx.config.debug.generate_assets = false;
    let server = server_with_projects(vec![project(&fx.workspace, "App", true)]);
    let mut extension = fx.extension();

    extension.activate(&server).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert!(!fx.vscode_file("launch.json").exists());
    assert!(
        extension
            .context()
            .host()
            .commands
            .contains(GENERATE_ASSETS_COMMAND)
    );
    extension.deactivate().await.unwrap();
}

#[tokio::test]
async fn server_exit_is_observed_as_stopped() {
    let fx = Fixture::new();
    let server = server_with_projects(Vec::new());
    let mut extension = fx.extension();
    extension.activate(&server).await.unwrap();

    assert!(server.disconnect());
    let client = extension.client().unwrap().clone();
    assert!(eventually(|| client.state() == ServerState::Stopped).await);

    extension.deactivate().await.unwrap();
    assert_eq!(server.count("shutdown"), 0);
}
