//! Line commands read from stdin while the host runs.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// `generate-assets [INDEX]`
    GenerateAssets(Option<usize>),
    /// `configurations`: what the `coreclr` provider offers.
    Configurations,
    /// `resolve`: complete an empty launch request.
    Resolve,
    /// `open PATH`: send the file's current content to the server.
    Open(PathBuf),
    /// `close PATH`
    Close(PathBuf),
    State,
    Output,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

pub const HELP: &str = "\
commands:
  generate-assets [INDEX]  write .vscode/tasks.json and launch.json
  configurations           list coreclr launch configurations
  resolve                  resolve an empty launch request
  open PATH                sync a document with the server
  close PATH               close a synced document
  state                    language server state
  output                   language server output channel
  help                     this text
  quit                     stop the server and exit";

impl FromStr for HostCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(CommandParseError::Empty);
        };
        let argument = words.next();
        if words.next().is_some() {
            return Err(CommandParseError::BadArgument {
                command: command_name(command),
                expected: "at most one argument",
            });
        }

        let parsed = match (command, argument) {
            ("generate-assets", None) => Self::GenerateAssets(None),
            ("generate-assets", Some(index)) => {
                let index = index.parse().map_err(|_| CommandParseError::BadArgument {
                    command: "generate-assets",
                    expected: "a project index",
                })?;
                Self::GenerateAssets(Some(index))
            }
            ("open", Some(path)) => Self::Open(PathBuf::from(path)),
            ("close", Some(path)) => Self::Close(PathBuf::from(path)),
            ("open" | "close", None) => {
                return Err(CommandParseError::BadArgument {
                    command: command_name(command),
                    expected: "a file path",
                });
            }
            ("configurations", None) => Self::Configurations,
            ("resolve", None) => Self::Resolve,
            ("state", None) => Self::State,
            ("output", None) => Self::Output,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            (
                "configurations" | "resolve" | "state" | "output" | "help" | "quit" | "exit",
                Some(_),
            ) => {
                return Err(CommandParseError::BadArgument {
                    command: command_name(command),
                    expected: "no arguments",
                });
            }
            (other, _) => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(parsed)
    }
}

fn command_name(command: &str) -> &'static str {
    match command {
        "generate-assets" => "generate-assets",
        "configurations" => "configurations",
        "resolve" => "resolve",
        "open" => "open",
        "close" => "close",
        "state" => "state",
        "output" => "output",
        "help" => "help",
        "quit" => "quit",
        "exit" => "exit",
        _ => "command",
    }
}
