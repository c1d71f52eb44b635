//! Plugin loader: turns ids or a directory into ordered mounts.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use corekit_core::result::AppResult;

use super::catalog::ModuleCatalog;
use super::definition::ModuleDefinition;
use super::discovery;
use super::sort::sort_by_dependencies;

/// Mounts one definition. The loader awaits each mount before starting the
/// next one.
#[async_trait]
pub trait MountHandler: Send + Sync {
    /// Mounts `definition`.
    async fn mount(&self, definition: ModuleDefinition) -> AppResult<()>;
}

type MountFuture = BoxFuture<'static, AppResult<()>>;

struct FnMountHandler {
    mount: Box<dyn Fn(ModuleDefinition) -> MountFuture + Send + Sync>,
}

#[async_trait]
impl MountHandler for FnMountHandler {
    async fn mount(&self, definition: ModuleDefinition) -> AppResult<()> {
        (self.mount)(definition).await
    }
}

/// Wraps an async closure into a [`MountHandler`].
pub fn mount_fn<F, Fut>(f: F) -> Arc<dyn MountHandler>
where
    F: Fn(ModuleDefinition) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    Arc::new(FnMountHandler {
        mount: Box::new(move |definition| f(definition).boxed()),
    })
}

/// Callback run once a batch has been mounted, with the number of mounts.
pub type AfterMount = Box<dyn FnOnce(usize) + Send>;

/// Per-call loader options.
#[derive(Default)]
pub struct MountOptions {
    /// Glob patterns matched against directory entry names.
    pub exclude: Vec<String>,
    /// Overrides the loader's mount handler for this call.
    pub mount_handler: Option<Arc<dyn MountHandler>>,
    /// Runs after the whole batch mounted.
    pub after_mount: Option<AfterMount>,
}

impl MountOptions {
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_mount_handler(mut self, handler: Arc<dyn MountHandler>) -> Self {
        self.mount_handler = Some(handler);
        self
    }

    pub fn with_after_mount(mut self, after_mount: impl FnOnce(usize) + Send + 'static) -> Self {
        self.after_mount = Some(Box::new(after_mount));
        self
    }
}

/// Loads module definitions and mounts them in dependency order.
pub struct PluginLoader {
    /// Compiled-in factories.
    catalog: Arc<ModuleCatalog>,
    /// Default mount strategy.
    mount_handler: Arc<dyn MountHandler>,
}

impl PluginLoader {
    /// Creates a loader over `catalog` mounting through `mount_handler`.
    pub fn new(catalog: Arc<ModuleCatalog>, mount_handler: Arc<dyn MountHandler>) -> Self {
        Self {
            catalog,
            mount_handler,
        }
    }

    /// Mounts the catalog modules named by `ids`.
    ///
    /// Any id missing from the catalog fails the call before anything is
    /// mounted. A failing mount aborts the rest of the batch.
    pub async fn mount_list<S: AsRef<str>>(
        &self,
        ids: &[S],
        external: &HashSet<String>,
        options: MountOptions,
    ) -> AppResult<usize> {
        let definitions = ids
            .iter()
            .map(|id| self.catalog.definition(id.as_ref()))
            .collect::<AppResult<Vec<_>>>()?;

        self.mount_all(definitions, external, options).await
    }

    /// Mounts every manifest found in `dir`. A missing directory is a
    /// warning and mounts nothing.
    pub async fn mount_directory(
        &self,
        dir: &Path,
        external: &HashSet<String>,
        options: MountOptions,
    ) -> AppResult<usize> {
        let patterns = discovery::compile_patterns(&options.exclude)?;
        let Some(files) = discovery::scan(dir, &patterns)? else {
            warn!(dir = %dir.display(), "Directory not found, nothing to mount");
            return Ok(0);
        };

        let definitions = discovery::module_definitions(&files, &self.catalog)?;
        self.mount_all(definitions, external, options).await
    }

    async fn mount_all(
        &self,
        definitions: Vec<ModuleDefinition>,
        external: &HashSet<String>,
        options: MountOptions,
    ) -> AppResult<usize> {
        let ordered = sort_by_dependencies(definitions, external)?;
        let handler = options
            .mount_handler
            .unwrap_or_else(|| self.mount_handler.clone());

        let count = ordered.len();
        for definition in ordered {
            debug!(module = %definition.id, "Mounting module");
            handler.mount(definition).await?;
        }

        info!(count = count, "Batch mounted");
        if let Some(after_mount) = options.after_mount {
            after_mount(count);
        }
        Ok(count)
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use corekit_core::error::{AppError, ErrorKind};
    use corekit_core::traits::Module;

    use crate::loader::definition::Factory;

    struct Noop;
    impl Module for Noop {}

    fn catalog() -> Arc<ModuleCatalog> {
        let mut catalog = ModuleCatalog::new();
        catalog
            .register("logger", Factory::ready(Noop))
            .register_definition(
                ModuleDefinition::new("dispatcher", Factory::ready(Noop)).with_dependencies(["logger"]),
            )
            .register_definition(
                ModuleDefinition::new("repl", Factory::ready(Noop)).with_dependencies(["dispatcher"]),
            );
        Arc::new(catalog)
    }

    fn recording() -> (Arc<Mutex<Vec<String>>>, Arc<dyn MountHandler>) {
        let mounted = Arc::new(Mutex::new(Vec::new()));
        let sink = mounted.clone();
        let handler = mount_fn(move |definition: ModuleDefinition| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(definition.id);
                Ok(())
            }
        });
        (mounted, handler)
    }

    #[tokio::test]
    async fn test_mount_list_in_dependency_order() {
        let (mounted, handler) = recording();
        let loader = PluginLoader::new(catalog(), handler);
        let batches = Arc::new(AtomicUsize::new(0));
        let counter = batches.clone();

        let count = loader
            .mount_list(
                &["repl", "dispatcher", "logger"],
                &HashSet::new(),
                MountOptions::default().with_after_mount(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(*mounted.lock().unwrap(), vec!["logger", "dispatcher", "repl"]);
        assert_eq!(batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_fails_before_mounting() {
        let (mounted, handler) = recording();
        let loader = PluginLoader::new(catalog(), handler);

        let err = loader
            .mount_list(&["logger", "ghost"], &HashSet::new(), MountOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Load);
        assert!(mounted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_mount_aborts_chain() {
        let (mounted, _) = recording();
        let sink = mounted.clone();
        let failing = mount_fn(move |definition: ModuleDefinition| {
            let sink = sink.clone();
            async move {
                if definition.id == "dispatcher" {
                    return Err(AppError::internal("boom"));
                }
                sink.lock().unwrap().push(definition.id);
                Ok(())
            }
        });
        let loader = PluginLoader::new(catalog(), failing);

        assert!(
            loader
                .mount_list(&["logger", "dispatcher", "repl"], &HashSet::new(), MountOptions::default())
                .await
                .is_err()
        );
        assert_eq!(*mounted.lock().unwrap(), vec!["logger"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_no_op() {
        let (mounted, handler) = recording();
        let loader = PluginLoader::new(catalog(), handler);
        let tmp = tempfile::tempdir().unwrap();

        let count = loader
            .mount_directory(&tmp.path().join("modules"), &HashSet::new(), MountOptions::default())
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(mounted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mount_directory_with_override_handler() {
        let (_, default_handler) = recording();
        let (mounted, override_handler) = recording();
        let loader = PluginLoader::new(catalog(), default_handler);
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("media.toml"), "dependencies = [\"pubsub\"]\n").unwrap();
        std::fs::write(tmp.path().join("pubsub.toml"), "").unwrap();
        std::fs::write(tmp.path().join("draft.toml"), "").unwrap();

        loader
            .mount_directory(
                tmp.path(),
                &HashSet::new(),
                MountOptions::default()
                    .with_exclude(vec!["draft*".to_string()])
                    .with_mount_handler(override_handler),
            )
            .await
            .unwrap();

        assert_eq!(*mounted.lock().unwrap(), vec!["pubsub", "media"]);
    }
}
