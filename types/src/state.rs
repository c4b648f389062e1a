//! Language server lifecycle states as observed by the client.

use serde::{Deserialize, Serialize};

/// State of the language server connection.
///
/// The server owns the real state machine; the client only observes
/// `Starting -> Running -> Stopped` through its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Starting,
    Running,
    Stopped,
}

impl ServerState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub old_state: ServerState,
    pub new_state: ServerState,
}

impl StateChange {
    #[must_use]
    pub const fn new(old_state: ServerState, new_state: ServerState) -> Self {
        Self {
            old_state,
            new_state,
        }
    }
}
