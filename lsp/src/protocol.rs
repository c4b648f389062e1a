//! JSON-RPC message shapes and the handful of LSP payloads the client sends.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};

use csharp_host_types::{DocumentSelector, FileEvent};

/// JSON-RPC `MethodNotFound`.
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Notification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A message received from the server, classified by shape.
#[derive(Debug)]
pub(crate) enum Incoming {
    Response {
        id: u64,
        body: Value,
    },
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl Incoming {
    pub fn classify(message: Value) -> Option<Self> {
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .map(String::from);
        let is_reply = message.get("result").is_some() || message.get("error").is_some();

        match (message.get("id").cloned(), method) {
            (Some(id), None) if is_reply => Some(Self::Response {
                id: id.as_u64()?,
                body: message,
            }),
            (Some(id), Some(method)) => Some(Self::Request {
                id,
                method,
                params: message.get("params").cloned(),
            }),
            (None, Some(method)) => Some(Self::Notification {
                method,
                params: message.get("params").cloned(),
            }),
            _ => None,
        }
    }
}

pub(crate) fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

pub(crate) fn result_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub(crate) fn initialize_params(
    client_id: &str,
    root_uri: &str,
    selector: &DocumentSelector,
) -> Value {
    json!({
        "processId": std::process::id(),
        "clientInfo": { "name": client_id },
        "rootUri": root_uri,
        "capabilities": {
            "workspace": {
                "configuration": true,
                "didChangeWatchedFiles": { "dynamicRegistration": false }
            },
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "willSave": false,
                    "willSaveWaitUntil": false,
                    "didSave": false
                }
            },
            "window": { "workDoneProgress": false }
        },
        "initializationOptions": {
            "documentSelector": selector.languages()
        },
        "workspaceFolders": [{ "uri": root_uri, "name": "workspace" }]
    })
}

pub(crate) fn did_open_params(uri: &str, language_id: &str, version: i32, text: &str) -> Value {
    json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn did_change_params(uri: &str, version: i32, text: &str) -> Value {
    json!({
        "textDocument": { "uri": uri, "version": version },
        "contentChanges": [{ "text": text }]
    })
}

pub(crate) fn did_close_params(uri: &str) -> Value {
    json!({ "textDocument": { "uri": uri } })
}

/// `workspace/didChangeWatchedFiles` params. Events whose path has no file URI are skipped.
pub(crate) fn did_change_watched_files_params(events: &[FileEvent]) -> Value {
    let changes: Vec<Value> = events
        .iter()
        .filter_map(|event| {
            let uri = path_to_file_uri(&event.path).ok()?;
            Some(json!({ "uri": uri.as_str(), "type": event.kind.as_lsp() }))
        })
        .collect();
    json!({ "changes": changes })
}

/// Reply to `workspace/configuration`: one `null` per requested item.
pub(crate) fn configuration_result(params: Option<&Value>) -> Value {
    let count = params
        .and_then(|p| p.get("items"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    Value::Array(vec![Value::Null; count])
}

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}
