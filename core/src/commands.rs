//! Host command registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use thiserror::Error;

use crate::Disposable;

/// Command execution future type alias.
pub type CommandFut<'a> = Pin<Box<dyn Future<Output = Result<Value, CommandError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },
    #[error("Duplicate command registered: {name}")]
    DuplicateCommand { name: String },
    #[error("Bad command args: {message}")]
    BadArgs { message: String },
    #[error("Command failed: {name}: {message}")]
    Failed { name: String, message: String },
}

/// A command callable by name with JSON arguments.
pub trait CommandHandler: Send + Sync {
    fn call(&self, args: Vec<Value>) -> CommandFut<'_>;
}

impl<F, Fut> CommandHandler for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, CommandError>> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> CommandFut<'_> {
        Box::pin(self(args))
    }
}

type HandlerMap = HashMap<String, Arc<dyn CommandHandler>>;

/// Shared command table. Clones refer to the same table.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: Arc<Mutex<HandlerMap>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. Disposing the returned handle unregisters it.
    pub fn register(
        &self,
        name: &str,
        handler: impl CommandHandler + 'static,
    ) -> Result<Disposable, CommandError> {
        {
            let mut handlers = self.lock();
            if handlers.contains_key(name) {
                return Err(CommandError::DuplicateCommand {
                    name: name.to_string(),
                });
            }
            handlers.insert(name.to_string(), Arc::new(handler));
        }
        tracing::debug!(command = name, "Registered command");

        let handlers = Arc::clone(&self.handlers);
        let key = name.to_string();
        Ok(Disposable::new(format!("command:{name}"), move || {
            handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }))
    }

    pub async fn execute(&self, name: &str, args: Vec<Value>) -> Result<Value, CommandError> {
        let handler = self
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CommandError::UnknownCommand {
                name: name.to_string(),
            })?;
        handler.call(args).await
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandlerMap> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn echo(args: Vec<Value>) -> Result<Value, CommandError> {
        Ok(Value::Array(args))
    }

    #[tokio::test]
    async fn execute_dispatches_to_registered_handler() {
        let registry = CommandRegistry::new();
        let _registration = registry.register("test.echo", echo).unwrap();

        let result = registry
            .execute("test.echo", vec![serde_json::json!(2)])
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!([2]));
    }

    #[tokio::test]
    async fn unknown_command_is_error() {
        let registry = CommandRegistry::new();
        let err = registry.execute("missing", Vec::new()).await.unwrap_err();
        assert!(matches!(err, CommandError::UnknownCommand { .. }));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = CommandRegistry::new();
        let _first = registry.register("test.echo", echo).unwrap();
        let err = registry.register("test.echo", echo).unwrap_err();
        assert!(matches!(err, CommandError::DuplicateCommand { .. }));
    }

    #[test]
    fn dispose_unregisters() {
        let registry = CommandRegistry::new();
        let registration = registry.register("test.echo", echo).unwrap();
        assert!(registry.contains("test.echo"));
        registration.dispose();
        assert!(!registry.contains("test.echo"));
        assert!(registry.names().is_empty());
    }
}
