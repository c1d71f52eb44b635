//! Module definitions and the factory contract.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use corekit_core::error::AppError;
use corekit_core::result::AppResult;
use corekit_core::traits::{Module, ModuleInstance};

use crate::application::Application;

/// Per-module configuration handed to [`Initializable::init`].
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Identifier the module registers under unless the config overrides it.
    pub moduleid: String,
    /// Base directory modules are loaded from.
    pub basepath: String,
    /// The module's slice of the configuration tree.
    pub values: Map<String, Value>,
    /// Cancelled when registration times out.
    pub cancel: CancellationToken,
}

impl ModuleConfig {
    /// Creates a config with an empty slice.
    pub fn new(moduleid: impl Into<String>, basepath: impl Into<String>) -> Self {
        Self {
            moduleid: moduleid.into(),
            basepath: basepath.into(),
            values: Map::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the value at `key` in the module's slice.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserializes the whole slice into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(Value::Object(self.values.clone())).map_err(|e| {
            AppError::configuration(format!(
                "Invalid configuration for module \"{}\": {e}",
                self.moduleid
            ))
        })
    }
}

/// A module that builds its instance asynchronously from the application
/// context and its configuration.
#[async_trait]
pub trait Initializable: Send + Sync + 'static {
    /// Name to register under instead of the mounted id.
    fn alias(&self) -> Option<String> {
        None
    }

    /// Builds the instance. `None` registers [`Initializable::fallback`].
    async fn init(
        &self,
        context: Arc<Application>,
        config: ModuleConfig,
    ) -> AppResult<Option<ModuleInstance>>;

    /// Instance registered when `init` returns `None`.
    fn fallback(&self) -> Option<ModuleInstance> {
        None
    }
}

type InitFuture = BoxFuture<'static, AppResult<Option<ModuleInstance>>>;

/// [`Initializable`] built from a closure.
pub struct FnInitializer {
    alias: Option<String>,
    init: Box<dyn Fn(Arc<Application>, ModuleConfig) -> InitFuture + Send + Sync>,
}

impl FnInitializer {
    /// Registers under `alias` instead of the mounted id.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Wraps an async closure into an [`Initializable`].
pub fn init_fn<F, Fut>(f: F) -> FnInitializer
where
    F: Fn(Arc<Application>, ModuleConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Option<ModuleInstance>>> + Send + 'static,
{
    FnInitializer {
        alias: None,
        init: Box::new(move |context, config| f(context, config).boxed()),
    }
}

#[async_trait]
impl Initializable for FnInitializer {
    fn alias(&self) -> Option<String> {
        self.alias.clone()
    }

    async fn init(
        &self,
        context: Arc<Application>,
        config: ModuleConfig,
    ) -> AppResult<Option<ModuleInstance>> {
        (self.init)(context, config).await
    }
}

/// How a module produces its instance.
#[derive(Clone)]
pub enum Factory {
    /// Built by an initializer.
    Init(Arc<dyn Initializable>),
    /// Already built.
    Ready(ModuleInstance),
}

impl Factory {
    /// Factory backed by an initializer.
    pub fn init(initializer: impl Initializable) -> Self {
        Self::Init(Arc::new(initializer))
    }

    /// Factory for an already built module.
    pub fn ready<T: Module>(module: T) -> Self {
        Self::Ready(ModuleInstance::new(module))
    }

    /// The alias declared by the initializer, if any.
    pub fn alias(&self) -> Option<String> {
        match self {
            Self::Init(initializer) => initializer.alias(),
            Self::Ready(_) => None,
        }
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(_) => f.write_str("Factory::Init(..)"),
            Self::Ready(instance) => f.debug_tuple("Factory::Ready").field(instance).finish(),
        }
    }
}

/// A module ready to be mounted.
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    /// Mount id; sanitized into the registration name.
    pub id: String,
    /// `None` when the source declared no usable factory.
    pub factory: Option<Factory>,
    /// Ids that must be mounted first.
    pub dependencies: Vec<String>,
    /// Tie-break between placeable definitions, lower first.
    pub priority: i32,
    /// Where the definition was discovered.
    pub path: Option<PathBuf>,
    /// Whether the module ships a `commands` directory.
    pub commands: bool,
}

impl ModuleDefinition {
    /// Definition with no dependencies and priority 0.
    pub fn new(id: impl Into<String>, factory: Factory) -> Self {
        Self {
            id: id.into(),
            factory: Some(factory),
            dependencies: Vec::new(),
            priority: 0,
            path: None,
            commands: false,
        }
    }

    /// Definition whose source declared no factory.
    pub fn without_factory(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            factory: None,
            dependencies: Vec::new(),
            priority: 0,
            path: None,
            commands: false,
        }
    }

    pub fn with_dependencies<S: Into<String>>(mut self, dependencies: impl IntoIterator<Item = S>) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_commands(mut self, commands: bool) -> Self {
        self.commands = commands;
        self
    }
}
