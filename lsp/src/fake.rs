//! In-memory language server for tests.
//!
//! [`FakeServer`] implements [`ServerSpawner`] over `tokio::io::duplex` pipes.
//! It records everything the client sends, answers `initialize` and
//! `shutdown`, and replies to other requests from a configurable table.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use crate::codec::{MessageReader, MessageWriter};
use crate::launcher::{LaunchError, ServerCommand, ServerProcess, ServerSpawner};
use crate::protocol::METHOD_NOT_FOUND;

const PIPE_CAPACITY: usize = 64 * 1024;
const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

enum Control {
    Send(Value),
    Stderr(String),
    Disconnect,
}

#[derive(Default)]
struct FakeState {
    spawns: Mutex<Vec<ServerCommand>>,
    received: Mutex<Vec<Value>>,
    results: Mutex<HashMap<String, Value>>,
    ignored: Mutex<HashSet<String>>,
    hang_up_after: Mutex<HashSet<String>>,
    control: Mutex<Option<mpsc::UnboundedSender<Control>>>,
    fail_spawn: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable stand-in for the language server process. Clones share state.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<FakeState>,
}

impl FakeServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `method` with `result`.
    pub fn respond_to(&self, method: &str, result: Value) {
        lock(&self.state.results).insert(method.to_string(), result);
    }

    /// Never answer requests for `method`.
    pub fn ignore(&self, method: &str) {
        lock(&self.state.ignored).insert(method.to_string());
    }

    /// Close both pipes right after answering `method`, as if the process died.
    pub fn hang_up_after(&self, method: &str) {
        lock(&self.state.hang_up_after).insert(method.to_string());
    }

    /// Make the next spawns fail as if the runtime were missing.
    pub fn fail_spawn(&self) {
        self.state.fail_spawn.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn spawn_count(&self) -> usize {
        lock(&self.state.spawns).len()
    }

    #[must_use]
    pub fn spawned_commands(&self) -> Vec<ServerCommand> {
        lock(&self.state.spawns).clone()
    }

    /// Every message received from the client, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<Value> {
        lock(&self.state.received).clone()
    }

    /// Methods of received requests and notifications, in arrival order.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        lock(&self.state.received)
            .iter()
            .filter_map(|m| m.get("method").and_then(Value::as_str).map(String::from))
            .collect()
    }

    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    #[must_use]
    pub fn first(&self, method: &str) -> Option<Value> {
        lock(&self.state.received)
            .iter()
            .find(|m| m.get("method").and_then(Value::as_str) == Some(method))
            .cloned()
    }

    /// Wait until at least `count` messages for `method` arrived.
    pub async fn wait_for(&self, method: &str, count: usize) -> bool {
        tokio::time::timeout(WAIT_TIMEOUT, async {
            while self.count(method) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Wait for the client's reply to a server-initiated request.
    pub async fn wait_for_reply(&self, id: u64) -> Option<Value> {
        let find = || {
            lock(&self.state.received)
                .iter()
                .find(|m| m.get("method").is_none() && m.get("id").and_then(Value::as_u64) == Some(id))
                .cloned()
        };
        tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                if let Some(reply) = find() {
                    return reply;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .ok()
    }

    /// Push a message (notification or request) to the client.
    pub fn send_to_client(&self, message: Value) -> bool {
        self.control(Control::Send(message))
    }

    pub fn write_stderr(&self, line: &str) -> bool {
        self.control(Control::Stderr(line.to_string()))
    }

    /// Close the server's stdout as if the process died.
    pub fn disconnect(&self) -> bool {
        self.control(Control::Disconnect)
    }

    fn control(&self, control: Control) -> bool {
        lock(&self.state.control)
            .as_ref()
            .is_some_and(|tx| tx.send(control).is_ok())
    }

    fn reply_for(&self, message: &Value) -> Option<Value> {
        let id = message.get("id")?.clone();
        let method = message.get("method").and_then(Value::as_str)?;
        if lock(&self.state.ignored).contains(method) {
            return None;
        }

        let configured = lock(&self.state.results).get(method).cloned();
        let result = match (configured, method) {
            (Some(result), _) => result,
            (None, "initialize") => json!({
                "capabilities": { "textDocumentSync": 1 },
                "serverInfo": { "name": "fake-server" }
            }),
            (None, "shutdown") => Value::Null,
            (None, _) => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": METHOD_NOT_FOUND, "message": format!("Unhandled method {method}") }
                }));
            }
        };
        Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }
}

impl ServerSpawner for FakeServer {
    fn spawn(&self, command: &ServerCommand) -> Result<ServerProcess, LaunchError> {
        lock(&self.state.spawns).push(command.clone());
        if self.state.fail_spawn.load(Ordering::SeqCst) {
            return Err(LaunchError::Spawn {
                program: command.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "fake spawn failure"),
            });
        }

        let (client_stdin, server_stdin) = tokio::io::duplex(PIPE_CAPACITY);
        let (server_stdout, client_stdout) = tokio::io::duplex(PIPE_CAPACITY);
        let (server_stderr, client_stderr) = tokio::io::duplex(PIPE_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.state.control) = Some(tx.clone());

        tokio::spawn(serve_output(server_stdout, server_stderr, rx));
        tokio::spawn(serve_input(self.clone(), server_stdin, tx));

        let mut process =
            ServerProcess::from_streams(Box::new(client_stdin), Box::new(client_stdout));
        process.stderr = Some(Box::new(client_stderr));
        Ok(process)
    }
}

async fn serve_input(
    server: FakeServer,
    stdin: DuplexStream,
    tx: mpsc::UnboundedSender<Control>,
) {
    let mut reader = MessageReader::new(stdin);
    while let Ok(Some(message)) = reader.read_message().await {
        lock(&server.state.received).push(message.clone());
        if let Some(reply) = server.reply_for(&message) {
            let _ = tx.send(Control::Send(reply));
        }
        let method = message.get("method").and_then(Value::as_str).unwrap_or_default();
        if method == "exit" || lock(&server.state.hang_up_after).contains(method) {
            break;
        }
    }
    let _ = tx.send(Control::Disconnect);
}

async fn serve_output(
    stdout: DuplexStream,
    mut stderr: DuplexStream,
    mut rx: mpsc::UnboundedReceiver<Control>,
) {
    let mut writer = MessageWriter::new(stdout);
    while let Some(control) = rx.recv().await {
        match control {
            Control::Send(message) => {
                if writer.write_message(&message).await.is_err() {
                    break;
                }
            }
            Control::Stderr(line) => {
                let _ = stderr.write_all(format!("{line}\n").as_bytes()).await;
            }
            Control::Disconnect => break,
        }
    }
}
