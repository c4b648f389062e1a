//! Debugger assets against hand-edited workspace files

use std::fs;

use serde_json::json;

use csharp_host::{CommandOutput, HostCommand};

use crate::common::{Fixture, eventually, project, server_with_projects};

const HAND_WRITTEN_LAUNCH: &str = r#"{
    // Keep my settings.
    "version": "0.2.0",
    "configurations": [
        {
            "name": "My App",
            "type": "coreclr",
            "request": "launch",
            "program": "${workspaceFolder}/out/App.dll",
        },
    ],
}
"#;

#[tokio::test]
async fn existing_coreclr_launch_configuration_is_left_untouched() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.workspace.join(".vscode")).unwrap();
    fs::write(fx.vscode_file("launch.json"), HAND_WRITTEN_LAUNCH).unwrap();
    let server = server_with_projects(vec![project(&fx.workspace, "App", true)]);
    let mut extension = fx.extension();

    extension.activate(&server).await.unwrap();
    assert!(eventually(|| fx.vscode_file("tasks.json").is_file()).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(
        fs::read_to_string(fx.vscode_file("launch.json")).unwrap(),
        HAND_WRITTEN_LAUNCH
    );
    extension.deactivate().await.unwrap();
}

#[tokio::test]
async fn generate_assets_replaces_generated_entries_and_keeps_custom_ones() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.workspace.join(".vscode")).unwrap();
    fs::write(fx.vscode_file("launch.json"), HAND_WRITTEN_LAUNCH).unwrap();
    let server = server_with_projects(vec![
        project(&fx.workspace, "Lib", false),
        project(&fx.workspace, "App", true),
        project(&fx.workspace, "Tool", true),
    ]);
    let mut extension = fx.extension();
    extension.activate(&server).await.unwrap();

    let output = extension.run(HostCommand::GenerateAssets(Some(1))).await.unwrap();
    let CommandOutput::Text(text) = output else {
        panic!("generate-assets prints its outcome");
    };
    let outcome: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(outcome["project"], "Tool");
    assert_eq!(outcome["launch"], "updated");

    let launch = fx.read_json("launch.json");
    let names: Vec<&str> = launch["configurations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|config| config["name"].as_str())
        .collect();
    assert_eq!(names, ["My App", ".NET Core Launch (console)", ".NET Core Attach"]);
    assert_eq!(
        launch["configurations"][1]["program"],
        json!("${workspaceFolder}/Tool/bin/Debug/Tool.dll")
    );

    // Running it again changes nothing.
    let CommandOutput::Text(again) = extension
        .run(HostCommand::GenerateAssets(Some(1)))
        .await
        .unwrap()
    else {
        panic!("generate-assets prints its outcome");
    };
    let again: serde_json::Value = serde_json::from_str(&again).unwrap();
    assert_eq!(again["tasks"], "unchanged");
    assert_eq!(again["launch"], "unchanged");

    extension.deactivate().await.unwrap();
}

#[tokio::test]
async fn generate_assets_without_executable_project_fails() {
    let fx = Fixture::new();
    let server = server_with_projects(vec![project(&fx.workspace, "Lib", false)]);
    let mut extension = fx.extension();
    extension.activate(&server).await.unwrap();

    let err = extension
        .run(HostCommand::GenerateAssets(None))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("no executable project"));
    assert!(!fx.vscode_file("launch.json").exists());

    extension.deactivate().await.unwrap();
}
