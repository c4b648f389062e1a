//! Language client: one server connection over framed stdio.
//!
//! A [`LanguageClient`] is a cheap, cloneable handle. `start` spawns the
//! server, wires the writer, reader and stderr tasks, and performs the
//! `initialize` handshake. State transitions are published through the
//! client's [`StateNotifier`] so listeners can be attached before `start`.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use csharp_host_config::HostConfig;
use csharp_host_core::{Disposable, OutputChannel};
use csharp_host_types::{
    CLIENT_ID, DocumentSelector, FileEvent, ServerState, StateChange, TextDocument,
};

use crate::codec::{MessageReader, MessageWriter};
use crate::launcher::{BoxedReader, BoxedWriter, LaunchError, ServerCommand, ServerSpawner};
use crate::protocol::{self, Incoming, Notification, PathToUriError, Request};
use crate::state::StateNotifier;

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// How long closing the connection waits for queued messages to reach the server.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("language client is already started")]
    AlreadyStarted,
    #[error(transparent)]
    Uri(#[from] PathToUriError),
    #[error("connection to the language server is closed")]
    WriterClosed,
    #[error("language server dropped the '{method}' request")]
    ResponseDropped { method: String },
    #[error("'{method}' timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
    #[error("language server returned error {code} for '{method}': {message}")]
    Server {
        method: String,
        code: i64,
        message: String,
    },
    #[error("failed to encode '{method}': {source}")]
    Encode {
        method: String,
        source: serde_json::Error,
    },
    #[error("failed to decode '{method}' result: {source}")]
    Decode {
        method: String,
        source: serde_json::Error,
    },
}

/// Client settings fixed for the lifetime of a connection.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub client_id: String,
    pub root: PathBuf,
    pub document_selector: DocumentSelector,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl ClientOptions {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(root, &HostConfig::default())
    }

    #[must_use]
    pub fn from_config(root: impl Into<PathBuf>, config: &HostConfig) -> Self {
        Self {
            client_id: CLIENT_ID.to_string(),
            root: root.into(),
            document_selector: config.sync.document_selector.clone(),
            request_timeout: config.server.request_timeout(),
            shutdown_grace: config.server.shutdown_grace(),
        }
    }
}

enum WriterCommand {
    Send(Value),
    Close,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

struct Inner {
    options: ClientOptions,
    output: OutputChannel,
    state: StateNotifier,
    writer_tx: Mutex<Option<mpsc::Sender<WriterCommand>>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    pending: PendingMap,
    next_id: AtomicU64,
    /// Open document URI to last sent version.
    documents: Mutex<HashMap<String, i32>>,
    child: tokio::sync::Mutex<Option<Child>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self
            .writer_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        for task in self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner).drain(..) {
            task.abort();
        }
    }
}

/// Handle to a language server connection. Clones share the connection.
#[derive(Clone)]
pub struct LanguageClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LanguageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageClient")
            .field("client_id", &self.inner.options.client_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl LanguageClient {
    /// A client in the `Stopped` state. Nothing is spawned until [`start`](Self::start).
    #[must_use]
    pub fn new(options: ClientOptions, output: OutputChannel) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                output,
                state: StateNotifier::new(),
                writer_tx: Mutex::new(None),
                writer_task: Mutex::new(None),
                pending: Arc::new(Mutex::new(HashMap::new())),
                next_id: AtomicU64::new(1),
                documents: Mutex::new(HashMap::new()),
                child: tokio::sync::Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.options.root
    }

    #[must_use]
    pub fn output(&self) -> &OutputChannel {
        &self.inner.output
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        self.inner.state.state()
    }

    #[must_use]
    pub fn state_notifier(&self) -> &StateNotifier {
        &self.inner.state
    }

    /// Listen for state transitions. Disposing the handle stops the listener.
    pub fn on_state_change<F, Fut>(&self, handler: F) -> Disposable
    where
        F: Fn(StateChange) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.state.on_change(handler)
    }

    /// Spawn the server and complete the `initialize` handshake.
    ///
    /// Emits `Starting`, then `Running` once the server has answered
    /// `initialize`. Any failure leaves the client `Stopped`.
    pub async fn start(
        &self,
        spawner: &dyn ServerSpawner,
        command: &ServerCommand,
    ) -> Result<(), ClientError> {
        if self.state() != ServerState::Stopped || self.writer().is_some() {
            return Err(ClientError::AlreadyStarted);
        }
        let root_uri = protocol::path_to_file_uri(&self.inner.options.root)?;

        self.inner.state.transition(ServerState::Starting);
        let process = match spawner.spawn(command) {
            Ok(process) => process,
            Err(e) => {
                self.inner.state.transition(ServerState::Stopped);
                return Err(e.into());
            }
        };

        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer_task = tokio::spawn(write_loop(process.stdin, writer_rx));
        let mut tasks = vec![tokio::spawn(read_loop(
                process.stdout,
                ReaderContext {
                    pending: Arc::clone(&self.inner.pending),
                    writer_tx: writer_tx.clone(),
                    output: self.inner.output.clone(),
                    state: self.inner.state.clone(),
                },
            ))];
        if let Some(stderr) = process.stderr {
            tasks.push(tokio::spawn(forward_stderr(
                stderr,
                self.inner.output.clone(),
            )));
        }
        self.lock_tasks().extend(tasks);
        *self.lock_writer_task() = Some(writer_task);
        *self.inner.child.lock().await = process.child;
        *self.lock_writer() = Some(writer_tx);

        let params = protocol::initialize_params(
            &self.inner.options.client_id,
            root_uri.as_str(),
            &self.inner.options.document_selector,
        );
        let result = match self.send_request("initialize", Some(params)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Language server initialize failed: {e}");
                self.close_writer().await;
                self.inner.state.transition(ServerState::Stopped);
                self.release();
                return Err(e);
            }
        };
        let server_name = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(server = server_name, "Language server initialized");

        if let Err(e) = self.send_notification("initialized", Some(json!({}))).await {
            tracing::error!("Language server initialized notification failed: {e}");
            self.close_writer().await;
            self.inner.state.transition(ServerState::Stopped);
            self.release();
            return Err(e);
        }
        // The reader may already have seen the server go away.
        if self
            .inner
            .state
            .transition_from(ServerState::Starting, ServerState::Running)
            .is_none()
        {
            tracing::error!("Language server exited during initialization");
            self.close_writer().await;
            self.release();
            return Err(ClientError::WriterClosed);
        }
        Ok(())
    }

    /// Send a request and wait for its result, bounded by the request timeout.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let message = serde_json::to_value(Request::new(id, method, params)).map_err(|source| {
            ClientError::Encode {
                method: method.to_string(),
                source,
            }
        })?;

        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id, tx);

        if let Err(e) = self.enqueue(message).await {
            self.lock_pending().remove(&id);
            return Err(e);
        }

        let timeout = self.inner.options.request_timeout;
        let body = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => {
                return Err(ClientError::ResponseDropped {
                    method: method.to_string(),
                });
            }
            Err(_) => {
                self.lock_pending().remove(&id);
                return Err(ClientError::Timeout {
                    method: method.to_string(),
                    timeout,
                });
            }
        };

        if let Some(error) = body.get("error") {
            return Err(ClientError::Server {
                method: method.to_string(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            });
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// [`send_request`](Self::send_request) with the result decoded into `R`.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<R, ClientError> {
        let result = self.send_request(method, params).await?;
        serde_json::from_value(result).map_err(|source| ClientError::Decode {
            method: method.to_string(),
            source,
        })
    }

    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), ClientError> {
        let message = serde_json::to_value(Notification::new(method, params)).map_err(|source| {
            ClientError::Encode {
                method: method.to_string(),
                source,
            }
        })?;
        self.enqueue(message).await
    }

    /// Send the document to the server: `didOpen` the first time, `didChange` after.
    ///
    /// Documents outside the selector are ignored and `Ok(false)` is returned.
    pub async fn sync_document(&self, document: &TextDocument) -> Result<bool, ClientError> {
        if !self
            .inner
            .options
            .document_selector
            .matches(&document.language_id)
        {
            return Ok(false);
        }

        let (version, opened) = {
            let mut documents = self.lock_documents();
            match documents.get_mut(&document.uri) {
                Some(version) => {
                    *version += 1;
                    (*version, false)
                }
                None => {
                    documents.insert(document.uri.clone(), 1);
                    (1, true)
                }
            }
        };

        let result = if opened {
            let params = protocol::did_open_params(
                &document.uri,
                &document.language_id,
                version,
                &document.text,
            );
            self.send_notification("textDocument/didOpen", Some(params))
                .await
        } else {
            let params = protocol::did_change_params(&document.uri, version, &document.text);
            self.send_notification("textDocument/didChange", Some(params))
                .await
        };
        if result.is_err() && opened {
            self.lock_documents().remove(&document.uri);
        }
        result.map(|()| true)
    }

    /// `didClose` for an open document. Unknown URIs return `Ok(false)`.
    pub async fn close_document(&self, uri: &str) -> Result<bool, ClientError> {
        if self.lock_documents().remove(uri).is_none() {
            return Ok(false);
        }
        self.send_notification("textDocument/didClose", Some(protocol::did_close_params(uri)))
            .await?;
        Ok(true)
    }

    #[must_use]
    pub fn document_version(&self, uri: &str) -> Option<i32> {
        self.lock_documents().get(uri).copied()
    }

    pub async fn notify_file_events(&self, events: &[FileEvent]) -> Result<(), ClientError> {
        if events.is_empty() {
            return Ok(());
        }
        let params = protocol::did_change_watched_files_params(events);
        self.send_notification("workspace/didChangeWatchedFiles", Some(params))
            .await
    }

    /// Orderly shutdown: `shutdown`, `exit`, close stdin, wait for the process.
    ///
    /// The process is never killed; if it outlives the grace period a warning
    /// is logged. Returns the `shutdown` request's outcome.
    pub async fn stop(&self) -> Result<(), ClientError> {
        if self.writer().is_none() {
            self.inner.state.transition(ServerState::Stopped);
            return Ok(());
        }
        if self.state() == ServerState::Stopped {
            tracing::debug!("Language server connection already lost; skipping shutdown");
            self.close_writer().await;
            self.release();
            return Ok(());
        }

        let shutdown = self.send_request("shutdown", None).await.map(|_| ());
        if let Err(e) = &shutdown {
            tracing::warn!("Language server shutdown request failed: {e}");
        }
        if let Err(e) = self.send_notification("exit", None).await {
            tracing::debug!("Could not send exit notification: {e}");
        }
        self.close_writer().await;
        self.wait_for_exit().await;

        self.inner.state.transition(ServerState::Stopped);
        self.release();
        shutdown
    }

    fn release(&self) {
        self.lock_documents().clear();
        if let Some(task) = self.lock_writer_task().take() {
            task.abort();
        }
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }

    async fn wait_for_exit(&self) {
        let Some(mut child) = self.inner.child.lock().await.take() else {
            return;
        };
        let grace = self.inner.options.shutdown_grace;
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => tracing::info!(%status, "Language server exited"),
            Ok(Err(e)) => tracing::warn!("Failed to wait for language server: {e}"),
            Err(_) => tracing::warn!(
                pid = ?child.id(),
                "Language server still running {grace:?} after exit; leaving it"
            ),
        }
    }

    async fn enqueue(&self, message: Value) -> Result<(), ClientError> {
        let tx = self.writer().ok_or(ClientError::WriterClosed)?;
        tx.send(WriterCommand::Send(message))
            .await
            .map_err(|_| ClientError::WriterClosed)
    }

    /// Queue `Close` and wait for the writer to flush everything before it.
    async fn close_writer(&self) {
        let tx = self.lock_writer().take();
        if let Some(tx) = tx {
            let _ = tx.send(WriterCommand::Close).await;
        }
        let Some(mut task) = self.lock_writer_task().take() else {
            return;
        };
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            tracing::warn!("Language server stdin did not drain in {WRITER_DRAIN_TIMEOUT:?}");
            task.abort();
        }
    }

    fn writer(&self) -> Option<mpsc::Sender<WriterCommand>> {
        self.lock_writer().clone()
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<WriterCommand>>> {
        self.inner
            .writer_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .writer_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_documents(&self) -> std::sync::MutexGuard<'_, HashMap<String, i32>> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn write_loop(stdin: BoxedWriter, mut rx: mpsc::Receiver<WriterCommand>) {
    let mut writer = MessageWriter::new(stdin);
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Send(message) => {
                if let Err(e) = writer.write_message(&message).await {
                    tracing::warn!("Language server write failed: {e}");
                    break;
                }
            }
            WriterCommand::Close => {
                if let Err(e) = writer.close().await {
                    tracing::debug!("Closing language server stdin: {e}");
                }
                break;
            }
        }
    }
}

struct ReaderContext {
    pending: PendingMap,
    writer_tx: mpsc::Sender<WriterCommand>,
    output: OutputChannel,
    state: StateNotifier,
}

async fn read_loop(stdout: BoxedReader, ctx: ReaderContext) {
    let mut reader = MessageReader::new(stdout);
    loop {
        match reader.read_message().await {
            Ok(Some(message)) => dispatch(message, &ctx).await,
            Ok(None) => {
                tracing::info!("Language server closed stdout");
                break;
            }
            Err(e) => {
                tracing::error!("Language server read failed: {e}");
                break;
            }
        }
    }
    // Dropping the senders fails every outstanding request.
    ctx.pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    ctx.state.transition(ServerState::Stopped);
}

async fn dispatch(message: Value, ctx: &ReaderContext) {
    let Some(incoming) = Incoming::classify(message) else {
        tracing::debug!("Ignoring malformed message from language server");
        return;
    };

    match incoming {
        Incoming::Response { id, body } => {
            let tx = ctx
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            match tx {
                Some(tx) => {
                    let _ = tx.send(body);
                }
                None => tracing::debug!(id, "Response for unknown request"),
            }
        }
        Incoming::Request { id, method, params } => {
            let reply = if method == "workspace/configuration" {
                protocol::result_response(id, protocol::configuration_result(params.as_ref()))
            } else {
                tracing::debug!(%method, "Rejecting server request");
                protocol::error_response(
                    id,
                    protocol::METHOD_NOT_FOUND,
                    &format!("Unhandled method {method}"),
                )
            };
            let _ = ctx.writer_tx.send(WriterCommand::Send(reply)).await;
        }
        Incoming::Notification { method, params } => match method.as_str() {
            "window/logMessage" | "window/showMessage" => {
                if let Some(line) = format_log_message(params.as_ref()) {
                    ctx.output.append_line(line);
                }
            }
            _ => tracing::trace!(%method, "Unhandled notification"),
        },
    }
}

fn format_log_message(params: Option<&Value>) -> Option<String> {
    let params = params?;
    let message = params.get("message").and_then(Value::as_str)?;
    let level = match params.get("type").and_then(Value::as_u64) {
        Some(1) => "Error",
        Some(2) => "Warn",
        Some(3) => "Info",
        _ => "Log",
    };
    Some(format!("[{level}] {message}"))
}

async fn forward_stderr(stderr: BoxedReader, output: OutputChannel) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => output.append_line(line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Language server stderr closed: {e}");
                break;
            }
        }
    }
}
