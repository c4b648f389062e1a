use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use csharp_host::{CommandOutput, Extension, HostCommand};
use csharp_host_config::{HostConfig, config_dir};
use csharp_host_lsp::ProcessSpawner;

/// Run the C# language server for a workspace and keep its debugger
/// assets up to date. Commands are read line by line from stdin.
#[derive(Parser, Debug)]
#[command(name = "csharp-host", version, about)]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, value_name = "DIR")]
    workspace: Option<PathBuf>,
    /// Directory the server layout is resolved against.
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,
    /// Config file to load instead of `$CSHARP_HOST_CONFIG` or `~/.csharp-host/config.toml`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = match &cli.config {
        Some(path) => HostConfig::load_from(path)?,
        None => HostConfig::load()?,
    };
    if let Some(dir) = cli.install_dir {
        config.server.install_dir = Some(dir);
    }

    let workspace = match cli.workspace {
        Some(dir) => dir,
        None => env::current_dir().context("cannot determine the current directory")?,
    };
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("workspace {} is not accessible", workspace.display()))?;

    let mut extension = Extension::new(extension_path(&workspace), workspace, config);
    if let Err(e) = extension.activate(&ProcessSpawner).await {
        if let Err(stop) = extension.deactivate().await {
            tracing::warn!("Cleanup after failed activation: {stop:#}");
        }
        return Err(e);
    }

    let served = serve(&extension).await;
    let stopped = extension.deactivate().await;
    served.and(stopped)
}

/// Read commands from stdin until `quit`, end of input or Ctrl-C.
async fn serve(extension: &Extension) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<HostCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        match extension.run(command).await {
            Ok(CommandOutput::Text(text)) => println!("{text}"),
            Ok(CommandOutput::Quit) => return Ok(()),
            Err(e) => eprintln!("error: {e:#}"),
        }
    }
}

/// Directory holding the running binary; the server layout is resolved
/// against it unless `install_dir` says otherwise.
fn extension_path(fallback: &Path) -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| fallback.to_path_buf())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Stdout carries command output; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.csharp-host/logs/csharp-host.log
    if let Some(dir) = config_dir() {
        candidates.push(dir.join("logs").join("csharp-host.log"));
    }

    // Fallback: ./.csharp-host/logs/csharp-host.log
    candidates.push(
        PathBuf::from(".csharp-host")
            .join("logs")
            .join("csharp-host.log"),
    );

    candidates
}
