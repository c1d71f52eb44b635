//! The application context: owns the bus, registry, loader and dispatcher,
//! and drives the boot sequence.
//!
//! Boot order:
//! 1. core modules from `loader.core_modules` → `coreplugins.ready`
//! 2. the commands directory → `commands.ready`
//! 3. the modules directory → `modules.ready`, then `modules.resolved` once
//!    every registration in flight settled
//! 4. commands shipped by modules, when `autoload_module_commands` is set
//! 5. `run()` when `autorun` is set

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::try_join_all;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use corekit_core::config::{AppConfig, ConfigTree};
use corekit_core::error::AppError;
use corekit_core::events::EventKey;
use corekit_core::result::AppResult;
use corekit_core::traits::{Module, ModuleFault, ModuleInstance};
use corekit_core::types::sanitize_name;

use crate::bus::{self, ChainError, EventBus, Listener, ListenerId, Payload};
use crate::commands::{Command, CommandCatalog, CommandDispatcher, CommandManifest};
use crate::hooks::HookEngine;
use crate::loader::discovery;
use crate::loader::{Factory, ModuleCatalog, ModuleConfig, ModuleDefinition, MountOptions, PluginLoader, mount_fn};
use crate::registry::{DependencyGraph, ModuleRegistry, RegistrationTracker, TrackerOutcome, Watch};
use crate::service_registry::ServiceRegistryClient;

/// Directory name holding a module's own commands.
const COMMANDS_DIR: &str = "commands";

/// Application context shared by every module.
pub struct Application {
    config: AppConfig,
    tree: ConfigTree,
    bus: Arc<EventBus<Payload>>,
    hooks: HookEngine<Payload>,
    registry: Arc<ModuleRegistry>,
    tracker: RegistrationTracker,
    graph: DependencyGraph,
    loader: PluginLoader,
    commands: CommandCatalog,
    dispatcher: Arc<CommandDispatcher>,
    service_registry: ServiceRegistryClient,
    /// Command directories already loaded.
    mounted_paths: Mutex<HashSet<PathBuf>>,
    /// Module directories whose commands are loaded after the modules.
    module_commands: Mutex<Vec<PathBuf>>,
    did_run: AtomicBool,
    this: Weak<Application>,
}

impl Application {
    /// Builds the application context.
    pub fn new(
        config: AppConfig,
        tree: ConfigTree,
        catalog: ModuleCatalog,
        commands: CommandCatalog,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Application>| {
            let bus = Arc::new(EventBus::new());
            let app = this.clone();
            let mount_handler = mount_fn(move |definition: ModuleDefinition| {
                let app = app.clone();
                async move {
                    match app.upgrade() {
                        Some(app) => app.mount_definition(definition).await,
                        None => Err(AppError::internal("Application dropped while mounting")),
                    }
                }
            });
            let service_registry = ServiceRegistryClient::new(config.registration.url.clone());

            Self {
                hooks: HookEngine::new(bus.clone()),
                registry: Arc::new(ModuleRegistry::new(bus.clone())),
                tracker: RegistrationTracker::new(),
                graph: DependencyGraph::new(),
                loader: PluginLoader::new(Arc::new(catalog), mount_handler),
                commands,
                dispatcher: CommandDispatcher::new(bus.clone()),
                service_registry,
                mounted_paths: Mutex::new(HashSet::new()),
                module_commands: Mutex::new(Vec::new()),
                did_run: AtomicBool::new(false),
                this: this.clone(),
                bus,
                config,
                tree,
            }
        })
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.config.app.name
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn bus(&self) -> &Arc<EventBus<Payload>> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &RegistrationTracker {
        &self.tracker
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    pub fn service_registry(&self) -> &ServiceRegistryClient {
        &self.service_registry
    }

    /// Child logger of module `name`.
    pub fn logger(&self, name: &str) -> tracing::Span {
        tracing::info_span!("module", id = %name)
    }

    /// Configuration handed to the `init` of module `name`.
    pub fn module_config(&self, name: &str) -> ModuleConfig {
        let basepath = self.config.loader.modules.clone();
        let values = self.tree.module_config(name, &basepath);
        let moduleid = values
            .get("moduleid")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string();

        let mut config = ModuleConfig::new(moduleid, basepath);
        config.values = values;
        config
    }

    /// Subscribes `listener` to `event`.
    pub fn on(&self, event: &str, listener: Listener<Payload>) -> ListenerId {
        self.bus.on(EventKey::parse(event), listener)
    }

    /// Emits `payload` on `event`.
    pub fn emit(&self, event: &str, payload: Payload) -> usize {
        self.bus.emit(&EventKey::parse(event), payload)
    }

    // ── Registration ────────────────────────────────────────────────

    /// Builds the instance produced by `factory` and registers it under the
    /// sanitized `name`, or under the initializer's alias.
    ///
    /// `init` is bounded by `app.register_timeout_ms`. A timeout or failure
    /// is reported to [`Application::on_error_handler`] as critical and
    /// returned.
    pub async fn register(self: &Arc<Self>, factory: Factory, name: &str) -> AppResult<ModuleInstance> {
        let name = match factory.alias() {
            Some(alias) => sanitize_name(&alias),
            None => sanitize_name(name),
        };
        let logger = self.logger(&name);

        self.tracker.begin(&name);
        self.registry.mark_registering(&name, logger.clone()).await;

        match self.build_instance(factory, &name, logger.clone()).await {
            Ok(instance) => {
                instance.assign_name(&name);
                instance.module().attach_logger(logger.clone());
                self.watch_faults(&name, &instance);
                self.registry.insert(&name, instance.clone(), logger).await;
                self.finish_registration(&name);
                Ok(instance)
            }
            Err(err) => {
                self.registry.mark_failed(&name).await;
                self.finish_registration(&name);
                self.on_error_handler(true, &format!("Error registering module \"{name}\""), &err);
                Err(err)
            }
        }
    }

    async fn build_instance(
        self: &Arc<Self>,
        factory: Factory,
        name: &str,
        logger: tracing::Span,
    ) -> AppResult<ModuleInstance> {
        let initializer = match factory {
            Factory::Ready(instance) => return Ok(instance),
            Factory::Init(initializer) => initializer,
        };

        let timeout = self.config.app.register_timeout();
        let cancel = CancellationToken::new();
        let mut config = self.module_config(name);
        config.cancel = cancel.clone();

        let init = initializer.init(self.clone(), config).instrument(logger);
        match tokio::time::timeout(timeout, init).await {
            Ok(Ok(Some(instance))) => Ok(instance),
            Ok(Ok(None)) => initializer.fallback().ok_or_else(|| {
                AppError::registration_failed(
                    name,
                    AppError::module("init returned no instance and the module has no fallback"),
                )
            }),
            Ok(Err(err)) => Err(AppError::registration_failed(name, err)),
            Err(_) => {
                cancel.cancel();
                Err(AppError::registration_timeout(name, timeout))
            }
        }
    }

    fn finish_registration(&self, name: &str) {
        if self.tracker.finish(name) == TrackerOutcome::Drained {
            self.emit_modules_resolved();
        }
    }

    fn emit_modules_resolved(&self) {
        info!("All modules resolved");
        self.bus.emit(&EventKey::modules_resolved(), Payload::Empty);
    }

    /// Mount strategy used by the loader: registers a discovered definition.
    ///
    /// A definition without a factory is a configuration error. Registration
    /// failures were already reported by [`Application::register`]; mounting
    /// continues with the next module.
    pub async fn mount_definition(self: &Arc<Self>, definition: ModuleDefinition) -> AppResult<()> {
        let Some(factory) = definition.factory else {
            let err = AppError::configuration(format!(
                "Module \"{}\" has no factory to initialize it",
                definition.id
            ));
            self.on_error_handler(true, "Module lacks an init capability", &err);
            return Ok(());
        };

        if definition.commands {
            if let Some(path) = &definition.path {
                debug!(module = %definition.id, "Queueing module commands");
                lock(&self.module_commands).push(path.clone());
            }
        }

        if let Err(err) = self.register(factory, &definition.id).await {
            debug!(module = %definition.id, error = %err, "Continuing after failed registration");
        }
        Ok(())
    }

    // ── Resolution ──────────────────────────────────────────────────

    /// Returns module `id` (its registration name), waiting up to
    /// `app.resolve_timeout_ms` for it.
    pub async fn resolve(&self, id: &str) -> AppResult<ModuleInstance> {
        if id.trim().is_empty() {
            return Err(AppError::invalid_identifier("resolve called without a module id"));
        }
        self.registry
            .wait_for(id, self.config.app.resolve_timeout())
            .await
    }

    /// Resolves every id; fails if any of them fails.
    pub async fn resolve_all<S: AsRef<str>>(&self, ids: &[S]) -> AppResult<Vec<ModuleInstance>> {
        try_join_all(ids.iter().map(|id| self.resolve(id.as_ref()))).await
    }

    /// Like [`Application::resolve`], but a missing id resolves to `None`
    /// when `ignore_undefined` is set.
    pub async fn resolve_optional(
        &self,
        id: Option<&str>,
        ignore_undefined: bool,
    ) -> AppResult<Option<ModuleInstance>> {
        match id.filter(|id| !id.trim().is_empty()) {
            Some(id) => self.resolve(id).await.map(Some),
            None if ignore_undefined => Ok(None),
            None => Err(AppError::invalid_identifier("resolve called without a module id")),
        }
    }

    /// Resolves module `id` as a `T`.
    pub async fn resolve_as<T: Module>(&self, id: &str) -> AppResult<Arc<T>> {
        let instance = self.resolve(id).await?;
        instance.downcast::<T>().ok_or_else(|| {
            AppError::module(format!(
                "Module \"{id}\" is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Calls `handler` with module `id` now if it is registered, otherwise
    /// once it registers. `id` is sanitized first. Never times out.
    pub async fn once_registered<F>(&self, id: &str, handler: F)
    where
        F: FnOnce(ModuleInstance) + Send + 'static,
    {
        match self.registry.watch(&sanitize_name(id)).await {
            Watch::Ready(instance) => handler(instance),
            Watch::Pending(receiver) => {
                tokio::spawn(async move {
                    if let Ok(Payload::Module(instance)) = receiver.await {
                        handler(instance);
                    }
                });
            }
        }
    }

    /// Whether module `id` is registered.
    pub async fn is_module_registered(&self, id: &str) -> bool {
        self.registry.is_registered(id).await
    }

    /// Resolves the dependencies of `requester`, failing right away when
    /// one of them is itself waiting on `requester`.
    pub async fn solve_dependencies<S: AsRef<str>>(
        &self,
        requester: &str,
        dependencies: &[S],
    ) -> AppResult<Vec<ModuleInstance>> {
        let _frames = dependencies
            .iter()
            .map(|dependency| self.graph.enter(dependency.as_ref(), requester))
            .collect::<AppResult<Vec<_>>>()?;

        self.resolve_all(dependencies).await.inspect_err(|e| {
            for dependency in dependencies {
                let dependency = dependency.as_ref();
                warn!(
                    module = %requester,
                    dependency = %dependency,
                    waiting = ?self.graph.waiting_on(dependency),
                    error = %e,
                    "Dependency not resolved"
                );
            }
        })
    }

    // ── Hooks and events ────────────────────────────────────────────

    /// Runs hook `name`; see [`HookEngine::hook`].
    pub async fn hook(&self, name: &str, args: Value) -> AppResult<Value> {
        self.hooks
            .hook(name, Payload::Value(args))
            .await
            .map(Payload::into_value)
    }

    /// Waits for every `resolve` event, failing on any `reject` event.
    pub async fn chain_events<S: AsRef<str>, R: AsRef<str>>(
        &self,
        resolve: &[S],
        reject: &[R],
    ) -> Result<Vec<Payload>, ChainError<Payload>> {
        bus::chain_events(&self.bus, resolve, reject).await
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Binds `handler` to `event_type`. See [`CommandDispatcher::command`].
    pub fn command(
        &self,
        event_type: &str,
        handler: Arc<dyn Command>,
        id: Option<&str>,
        unique: bool,
    ) -> Option<String> {
        self.dispatcher.command(event_type, handler, id, unique)
    }

    pub fn reload_command(&self, id: &str, handler: Arc<dyn Command>) -> AppResult<()> {
        self.dispatcher.reload_command(id, handler)
    }

    pub fn remove_command(&self, id: &str) -> bool {
        self.dispatcher.remove_command(id)
    }

    pub fn has_command(&self, event_type: &str) -> bool {
        self.dispatcher.has_command(event_type)
    }

    // ── Loading ─────────────────────────────────────────────────────

    async fn external_modules(&self) -> HashSet<String> {
        self.registry.names().await.into_iter().collect()
    }

    /// Mounts `loader.core_modules` and emits `coreplugins.ready`.
    pub async fn load_core_modules(self: &Arc<Self>) -> AppResult<usize> {
        let app = self.clone();
        let options = MountOptions::default().with_after_mount(move |count| {
            debug!(count = count, "Core modules loaded");
            app.bus.emit(&EventKey::coreplugins_ready(), Payload::Empty);
        });

        let external = self.external_modules().await;
        self.loader
            .mount_list(&self.config.loader.core_modules, &external, options)
            .await
    }

    /// Mounts every module manifest in `dir`, then emits `modules.ready` and
    /// starts the bulk phase that ends with `modules.resolved`.
    pub async fn load_modules(self: &Arc<Self>, dir: &Path) -> AppResult<usize> {
        let options = MountOptions::default().with_exclude(self.config.loader.exclude.clone());
        let external = self.external_modules().await;
        let count = self.loader.mount_directory(dir, &external, options).await?;

        self.bus.emit(&EventKey::modules_ready(), Payload::Empty);
        if self.tracker.begin_bulk_phase() {
            self.emit_modules_resolved();
        }
        Ok(count)
    }

    /// Binds every command manifest in `dir` and emits `commands.ready`.
    ///
    /// Each manifest binds the catalog command named by its `command` key
    /// (default: the sanitized file name) to its `event` (same default),
    /// using the sanitized file name as binding id.
    pub async fn load_commands(self: &Arc<Self>, dir: &Path) -> AppResult<usize> {
        lock(&self.mounted_paths).insert(dir.to_path_buf());

        let patterns = discovery::compile_patterns(&self.config.loader.exclude)?;
        let Some(files) = discovery::scan(dir, &patterns)? else {
            warn!(dir = %dir.display(), "Commands directory not found");
            self.bus.emit(&EventKey::commands_ready(), Payload::Empty);
            return Ok(0);
        };

        let mut count = 0;
        for file in files {
            let manifest: CommandManifest = discovery::parse_manifest(&file.manifest_path)?;
            let name = sanitize_name(&file.name);
            let event = manifest.event.unwrap_or_else(|| name.clone());
            let key = manifest.command.unwrap_or_else(|| name.clone());

            let Some(factory) = self.commands.get(&key) else {
                warn!(command = %key, path = %file.manifest_path.display(), "No command registered under this name");
                continue;
            };
            if self
                .dispatcher
                .command(&event, factory(self.clone()), Some(&name), manifest.unique)
                .is_some()
            {
                count += 1;
            }
        }

        debug!(dir = %dir.display(), count = count, "Commands loaded");
        self.bus.emit(&EventKey::commands_ready(), Payload::Empty);
        Ok(count)
    }

    /// Loads the `commands` directory of a module, given its id (relative
    /// to `loader.modules`) or its absolute path. Each directory loads at
    /// most once.
    pub async fn load_module_commands(self: &Arc<Self>, module: &str) -> AppResult<usize> {
        let path = Path::new(module);
        let dir = if path.is_absolute() {
            path.join(COMMANDS_DIR)
        } else {
            Path::new(&self.config.loader.modules)
                .join(module)
                .join(COMMANDS_DIR)
        };
        self.load_commands_once(&dir).await
    }

    async fn load_commands_once(self: &Arc<Self>, dir: &Path) -> AppResult<usize> {
        debug!(dir = %dir.display(), "Loading module commands");
        let mounted = lock(&self.mounted_paths).contains(dir);
        if mounted {
            return Ok(0);
        }
        self.load_commands(dir).await
    }

    /// Loads commands of every mounted module that ships some, when
    /// `app.autoload_module_commands` is set.
    pub async fn load_module_exposed_commands(self: &Arc<Self>) -> AppResult<usize> {
        if !self.config.app.autoload_module_commands {
            debug!("Ignoring module commands, set app.autoload_module_commands to load them");
            return Ok(0);
        }

        let modules: Vec<PathBuf> = lock(&self.module_commands).drain(..).collect();
        let mut count = 0;
        for module in modules {
            count += self.load_commands_once(&module.join(COMMANDS_DIR)).await?;
        }
        Ok(count)
    }

    /// Runs the boot sequence. Errors are reported as critical and returned.
    pub async fn boot(self: &Arc<Self>) -> AppResult<()> {
        info!(
            app = %self.config.app.name,
            environment = %self.config.app.environment,
            "Booting application"
        );

        let result = self.boot_sequence().await;
        if let Err(err) = &result {
            self.on_error_handler(true, "Error booting application", err);
        }
        result
    }

    async fn boot_sequence(self: &Arc<Self>) -> AppResult<()> {
        self.load_core_modules().await?;

        let commands = PathBuf::from(&self.config.loader.commands);
        self.load_commands(&commands).await?;

        let modules = PathBuf::from(&self.config.loader.modules);
        self.load_modules(&modules).await?;

        self.load_module_exposed_commands().await?;

        if self.config.app.autorun {
            self.run().await?;
        }
        Ok(())
    }

    /// Runs the `run` hook with `{name}` and announces the application.
    /// Only the first call does anything.
    pub async fn run(&self) -> AppResult<()> {
        if self.did_run.swap(true, Ordering::SeqCst) {
            debug!("Application already ran");
            return Ok(());
        }

        info!(app = %self.config.app.name, "Running application");
        self.hook("run", json!({ "name": self.config.app.name })).await?;
        self.register_application(true).await;
        Ok(())
    }

    /// Announces (or withdraws) the application to the service registry
    /// when `registration.enabled` is set.
    pub async fn register_application(&self, register: bool) {
        if !self.config.registration.enabled {
            debug!("Service registration disabled");
            return;
        }
        let data = ServiceRegistryClient::registration_data(&self.config, &self.tree);
        self.service_registry.announce(&data, register).await;
    }

    // ── Errors and shutdown ─────────────────────────────────────────

    /// Logs `err` with its chain. Exits with code 1 when `critical` and
    /// `app.exit_on_error` are both set.
    pub fn on_error_handler(&self, critical: bool, message: &str, err: &AppError) {
        error!(critical = critical, kind = %err.kind, error = %err.full_chain(), "{message}");
        if critical && self.config.app.exit_on_error {
            error!("Critical error, exiting");
            std::process::exit(1);
        }
    }

    /// Handles a fault raised by module `id`. Faults the module handled
    /// itself are only logged; any other fault is returned as an error.
    pub fn handle_module_error(&self, id: &str, fault: &ModuleFault) -> AppResult<()> {
        if fault.handled_by_module {
            warn!(module = %id, fault = %fault, "Module handled its own error");
            return Ok(());
        }
        error!(module = %id, fault = %fault, "Module error");
        Err(AppError::module(format!("Module \"{id}\" failed: {fault}")))
    }

    fn watch_faults(&self, name: &str, instance: &ModuleInstance) {
        let Some(mut faults) = instance.module().faults() else {
            return;
        };
        let app = self.this.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            loop {
                match faults.recv().await {
                    Ok(fault) => {
                        let Some(app) = app.upgrade() else { break };
                        if let Err(err) = app.handle_module_error(&name, &fault) {
                            app.on_error_handler(true, "Unhandled module error", &err);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(module = %name, skipped = skipped, "Module faults dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Emits `closing` and withdraws from the service registry.
    pub async fn close(&self, code: i32, label: &str) {
        warn!(code = code, label = %label, "Closing application");
        self.bus.emit(
            &EventKey::closing(),
            Payload::Value(json!({ "code": code, "label": label })),
        );
        self.register_application(false).await;
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.config.app.name)
            .field("environment", &self.config.app.environment)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::{broadcast, oneshot};

    use corekit_core::error::ErrorKind;

    use crate::bus::listener;
    use crate::loader::init_fn;

    struct Store {
        label: &'static str,
    }
    impl Module for Store {}

    struct Noisy {
        faults: broadcast::Sender<ModuleFault>,
    }
    impl Module for Noisy {
        fn faults(&self) -> Option<broadcast::Receiver<ModuleFault>> {
            Some(self.faults.subscribe())
        }
    }

    fn app_with(settings: Value) -> Arc<Application> {
        let mut root = json!({
            "app": { "name": "test", "exit_on_error": false },
            "loader": { "core_modules": [] }
        });
        if let (Value::Object(root), Value::Object(extra)) = (&mut root, settings) {
            root.extend(extra);
        }
        let tree = ConfigTree::new(root);
        let config = AppConfig::from_tree(&tree).unwrap();
        Application::new(config, tree, ModuleCatalog::new(), CommandCatalog::new())
    }

    fn app() -> Arc<Application> {
        app_with(json!({}))
    }

    #[tokio::test]
    async fn test_register_then_resolve_same_instance() {
        let app = app();
        let instance = app
            .register(Factory::ready(Store { label: "db" }), "data-store")
            .await
            .unwrap();

        let resolved = app.resolve("dataStore").await.unwrap();
        assert!(resolved.ptr_eq(&instance));
        assert!(app.is_module_registered("dataStore").await);
        assert!(!app.is_module_registered("data-store").await);
        assert_eq!(app.resolve_as::<Store>("dataStore").await.unwrap().label, "db");
    }

    #[tokio::test]
    async fn test_registered_instance_learns_its_name() {
        let app = app();
        let instance = app
            .register(Factory::ready(Store { label: "db" }), "data-store")
            .await
            .unwrap();

        assert_eq!(instance.module_id().as_deref(), Some("dataStore"));
        let resolved = app.resolve("dataStore").await.unwrap();
        assert_eq!(resolved.module_id().as_deref(), Some("dataStore"));
    }

    #[tokio::test]
    async fn test_init_receives_config_and_alias_renames() {
        let app = app_with(json!({ "cache": { "ttl": 30 } }));
        let factory = Factory::init(
            init_fn(|_app, config: ModuleConfig| async move {
                assert_eq!(config.moduleid, "cache");
                assert_eq!(config.get("ttl"), Some(&json!(30)));
                Ok(Some(ModuleInstance::new(Store { label: "cache" })))
            })
            .with_alias("fast-cache"),
        );

        app.register(factory, "cache").await.unwrap();
        assert!(app.is_module_registered("fastCache").await);
        assert!(!app.is_module_registered("cache").await);
    }

    #[tokio::test]
    async fn test_init_failure_marks_failed() {
        let app = app();
        let factory = Factory::init(init_fn(|_app, _config| async {
            Err(AppError::internal("no database"))
        }));

        let err = app.register(factory, "orm").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RegistrationFailed);
        assert_eq!(
            app.registry().state("orm").await,
            crate::registry::RecordState::Failed
        );
        assert!(app.tracker().pending().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_identifier_checks() {
        let app = app();
        assert_eq!(app.resolve("").await.unwrap_err().kind, ErrorKind::InvalidIdentifier);
        assert!(app.resolve_optional(None, true).await.unwrap().is_none());
        assert_eq!(
            app.resolve_optional(None, false).await.unwrap_err().kind,
            ErrorKind::InvalidIdentifier
        );
    }

    #[tokio::test]
    async fn test_resolve_all_waits_for_each() {
        let app = app();
        let waiter = {
            let app = app.clone();
            tokio::spawn(async move { app.resolve_all(&["a", "b"]).await })
        };
        tokio::task::yield_now().await;

        app.register(Factory::ready(Store { label: "a" }), "a").await.unwrap();
        app.register(Factory::ready(Store { label: "b" }), "b").await.unwrap();

        let resolved = waiter.await.unwrap().unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[tokio::test]
    async fn test_mutual_wait_is_a_cycle() {
        let app = app();
        let first = {
            let app = app.clone();
            tokio::spawn(async move { app.solve_dependencies("a", &["b"]).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = app.solve_dependencies("b", &["a"]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CyclicDependency);
        assert!(err.message.contains("a -> b -> a"), "{}", err.message);
        first.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_dependency_releases_waits() {
        let app = app_with(json!({
            "app": { "name": "test", "exit_on_error": false, "resolve_timeout_ms": 50 }
        }));
        let first = {
            let app = app.clone();
            tokio::spawn(async move { app.solve_dependencies("api", &["db"]).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(app.graph.waiting_on("db"), vec!["api"]);

        let err = first.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResolveTimeout);
        assert!(app.graph.waiting_on("db").is_empty());
        assert!(app.graph.is_empty());
    }

    #[tokio::test]
    async fn test_once_registered_before_and_after() {
        let app = app();
        let (tx, rx) = oneshot::channel();
        app.once_registered("repl", move |instance| {
            let _ = tx.send(instance);
        })
        .await;

        let instance = app
            .register(Factory::ready(Store { label: "repl" }), "repl")
            .await
            .unwrap();
        assert!(rx.await.unwrap().ptr_eq(&instance));

        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        app.once_registered("repl", move |_| flag.store(true, Ordering::SeqCst))
            .await;
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_happens_once() {
        let app = app();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        app.on(
            "run.pre",
            listener(move |payload: Payload| {
                let counter = counter.clone();
                async move {
                    assert_eq!(payload.as_value().unwrap()["name"], json!("test"));
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            }),
        );

        app.run().await.unwrap();
        app.run().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_module_faults() {
        let app = app();
        assert!(app.handle_module_error("mail", &ModuleFault::handled("retrying")).is_ok());
        let err = app
            .handle_module_error("mail", &ModuleFault::new("smtp down"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Module);

        let (faults, _) = broadcast::channel(4);
        let noisy = Noisy { faults: faults.clone() };
        app.register(Factory::ready(noisy), "mail").await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(faults.send(ModuleFault::handled("ok")).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_definition_without_factory_degrades() {
        let app = app();
        app.mount_definition(ModuleDefinition::without_factory("ghost"))
            .await
            .unwrap();
        assert!(!app.is_module_registered("ghost").await);
    }

    #[tokio::test]
    async fn test_close_emits_closing() {
        let app = app();
        let (_, closing) = app.bus().once(EventKey::closing());
        app.close(0, "SIGINT").await;
        let payload = closing.await.unwrap().into_value();
        assert_eq!(payload, json!({ "code": 0, "label": "SIGINT" }));
    }
}
