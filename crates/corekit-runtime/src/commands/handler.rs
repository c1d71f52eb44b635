//! The command contract and the catalog of compiled-in commands.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use corekit_core::result::AppResult;

use super::event::CommandEvent;
use crate::application::Application;

/// A command bound to an event type.
///
/// Returning `Ok(None)` (or `Some(Value::Null)`) completes silently: no
/// reply is sent and no `.done` event fires.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Runs the command.
    async fn execute(&self, event: CommandEvent) -> AppResult<Option<Value>>;
}

type CommandFuture = BoxFuture<'static, AppResult<Option<Value>>>;

struct FnCommand {
    execute: Box<dyn Fn(CommandEvent) -> CommandFuture + Send + Sync>,
}

#[async_trait]
impl Command for FnCommand {
    async fn execute(&self, event: CommandEvent) -> AppResult<Option<Value>> {
        (self.execute)(event).await
    }
}

/// Wraps an async closure into a [`Command`].
pub fn command_fn<F, Fut>(f: F) -> Arc<dyn Command>
where
    F: Fn(CommandEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Option<Value>>> + Send + 'static,
{
    Arc::new(FnCommand {
        execute: Box::new(move |event| f(event).boxed()),
    })
}

/// Builds a command against the application it will run in.
pub type CommandFactory = Arc<dyn Fn(Arc<Application>) -> Arc<dyn Command> + Send + Sync>;

/// Commands the binary knows how to build, keyed by name.
#[derive(Clone, Default)]
pub struct CommandCatalog {
    entries: HashMap<String, CommandFactory>,
}

impl CommandCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a factory under `key`.
    pub fn register_with<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Arc<Application>) -> Arc<dyn Command> + Send + Sync + 'static,
    {
        self.entries.insert(key.into(), Arc::new(factory));
        self
    }

    /// Adds a command that needs no application handle.
    pub fn register(&mut self, key: impl Into<String>, command: Arc<dyn Command>) -> &mut Self {
        self.register_with(key, move |_| command.clone())
    }

    /// Returns the factory under `key`.
    pub fn get(&self, key: &str) -> Option<CommandFactory> {
        self.entries.get(key).cloned()
    }

    /// Known keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for CommandCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandCatalog")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Contents of a command manifest in a commands directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandManifest {
    /// Event type to bind; defaults to the sanitized file name.
    #[serde(default)]
    pub event: Option<String>,
    /// Catalog key; defaults to the sanitized file name.
    #[serde(default)]
    pub command: Option<String>,
    /// Refuse to bind when the event type already has a listener.
    #[serde(default)]
    pub unique: bool,
}
