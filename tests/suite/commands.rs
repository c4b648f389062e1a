//! Host commands against a running extension

use std::fs;
use std::path::PathBuf;

use serde_json::{Value, json};

use csharp_host::{CommandOutput, Extension, HostCommand};

use crate::common::{Fixture, project, server_with_projects};

async fn text(extension: &Extension, command: HostCommand) -> String {
    match extension.run(command).await.unwrap() {
        CommandOutput::Text(text) => text,
        CommandOutput::Quit => panic!("unexpected quit"),
    }
}

#[tokio::test]
async fn configurations_and_resolve_come_from_workspace_projects() {
    let fx = Fixture::new();
    let server = server_with_projects(vec![
        project(&fx.workspace, "App", true),
        project(&fx.workspace, "Tool", true),
    ]);
    let mut extension = fx.extension();
    extension.activate(&server).await.unwrap();

    let configurations: Value =
        serde_json::from_str(&text(&extension, HostCommand::Configurations).await).unwrap();
    assert_eq!(configurations.as_array().unwrap().len(), 2);
    assert_eq!(configurations[1]["program"], "${workspaceFolder}/Tool/bin/Debug/Tool.dll");

    let resolved: Value =
        serde_json::from_str(&text(&extension, HostCommand::Resolve).await).unwrap();
    assert_eq!(resolved["type"], "coreclr");
    assert_eq!(resolved["program"], "${workspaceFolder}/App/bin/Debug/App.dll");

    extension.deactivate().await.unwrap();
}

#[tokio::test]
async fn resolve_without_executable_aborts_launch() {
    let fx = Fixture::new();
    let server = server_with_projects(Vec::new());
    let mut extension = fx.extension();
    extension.activate(&server).await.unwrap();

    assert_eq!(
        text(&extension, HostCommand::Resolve).await,
        "launch aborted: no executable project"
    );
    extension.deactivate().await.unwrap();
}

#[tokio::test]
async fn open_syncs_csharp_documents_with_increasing_versions() {
    let fx = Fixture::new();
    fs::write(fx.workspace.join("Program.cs"), "class Program {}").unwrap();
    fs::write(fx.workspace.join("notes.md"), "# notes").unwrap();
    let server = server_with_projects(Vec::new());
    let mut extension = fx.extension();
    extension.activate(&server).await.unwrap();

    let first = text(&extension, HostCommand::Open(PathBuf::from("Program.cs"))).await;
    assert!(first.ends_with("(version 1)"), "{first}");
    let second = text(&extension, HostCommand::Open(PathBuf::from("Program.cs"))).await;
    assert!(second.ends_with("(version 2)"), "{second}");
    let skipped = text(&extension, HostCommand::Open(PathBuf::from("notes.md"))).await;
    assert!(skipped.contains("is not a csharp document"));

    assert!(server.wait_for("textDocument/didChange", 1).await);
    let opened = server.first("textDocument/didOpen").unwrap();
    assert_eq!(opened["params"]["textDocument"]["languageId"], "csharp");
    assert_eq!(opened["params"]["textDocument"]["text"], "class Program {}");
    assert_eq!(server.count("textDocument/didOpen"), 1);

    let closed = text(&extension, HostCommand::Close(PathBuf::from("Program.cs"))).await;
    assert!(closed.starts_with("closed "));
    assert!(server.wait_for("textDocument/didClose", 1).await);
    let again = text(&extension, HostCommand::Close(PathBuf::from("Program.cs"))).await;
    assert!(again.ends_with("is not open"));

    extension.deactivate().await.unwrap();
}

#[tokio::test]
async fn state_and_output_reflect_the_server() {
    let fx = Fixture::new();
    let server = server_with_projects(Vec::new());
    let mut extension = fx.extension();
    extension.activate(&server).await.unwrap();

    assert_eq!(text(&extension, HostCommand::State).await, "running");
    server.send_to_client(json!({
        "jsonrpc": "2.0",
        "method": "window/logMessage",
        "params": { "type": 3, "message": "Project system ready" }
    }));
    let mut output = String::new();
    for _ in 0..100 {
        output = text(&extension, HostCommand::Output).await;
        if output.contains("Project system ready") {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(output.contains("[Info] Project system ready"), "{output}");

    extension.deactivate().await.unwrap();
    assert_eq!(text(&extension, HostCommand::State).await, "inactive");
}
