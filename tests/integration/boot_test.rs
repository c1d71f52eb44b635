//! Integration tests for the boot sequence.

mod helpers;

use std::sync::{Arc, Mutex};

use serde_json::json;

use corekit::modules::{Dispatcher, Logger, Repl};
use corekit_core::events::EventKey;
use corekit_core::traits::{Module, ModuleInstance};
use corekit_runtime::loader::{Factory, ModuleCatalog, ModuleConfig, init_fn};

struct Named;
impl Module for Named {}

/// Catalog whose factories record their mount order.
fn recording_catalog(order: Arc<Mutex<Vec<String>>>, ids: &[&'static str]) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    for &id in ids {
        let order = order.clone();
        catalog.register(
            id,
            Factory::init(init_fn(move |_app, config: ModuleConfig| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(config.moduleid.clone());
                    Ok(Some(ModuleInstance::new(Named)))
                }
            })),
        );
    }
    catalog
}

#[tokio::test]
async fn test_boot_mounts_core_modules() {
    let test = helpers::TestApp::new(json!({
        "loader": { "core_modules": ["logger", "dispatcher", "repl"] },
        "logger": { "level": "debug" },
    }));
    test.app.boot().await.unwrap();

    let logger = test.app.resolve_as::<Logger>("logger").await.unwrap();
    assert_eq!(logger.level(), "debug");
    test.app.resolve_as::<Dispatcher>("dispatcher").await.unwrap();
    let repl = test.app.resolve_as::<Repl>("repl").await.unwrap();
    assert!(!repl.enabled());

    let mut names = test.app.registry().names().await;
    names.sort();
    assert_eq!(names, vec!["dispatcher", "logger", "repl"]);
}

#[tokio::test]
async fn test_boot_emits_lifecycle_events() {
    let test = helpers::TestApp::new(json!({}));
    let bus = test.app.bus().clone();
    let (_, core) = bus.once(EventKey::coreplugins_ready());
    let (_, commands) = bus.once(EventKey::commands_ready());
    let (_, modules) = bus.once(EventKey::modules_ready());
    let (_, resolved) = bus.once(EventKey::modules_resolved());

    test.app.boot().await.unwrap();

    assert!(core.await.is_ok());
    assert!(commands.await.is_ok());
    assert!(modules.await.is_ok());
    assert!(resolved.await.is_ok());
}

#[tokio::test]
async fn test_modules_directory_mounts_dependencies_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let test = helpers::TestApp::with_catalogs(
        json!({}),
        recording_catalog(order.clone(), &["api", "cache", "mailer"]),
        corekit::command_catalog(),
    );
    test.write("modules/api.toml", "dependencies = [\"cache\", \"mailer\"]\n");
    test.write("modules/cache.toml", "");
    test.write("modules/mailer.toml", "dependencies = [\"cache\"]\n");

    test.app.boot().await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["cache", "mailer", "api"]);
    assert!(test.app.is_module_registered("api").await);
}

#[tokio::test]
async fn test_modules_directory_cycle_fails_boot() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let test = helpers::TestApp::with_catalogs(
        json!({}),
        recording_catalog(order.clone(), &["a", "b"]),
        corekit::command_catalog(),
    );
    test.write("modules/a.toml", "dependencies = [\"b\"]\n");
    test.write("modules/b.toml", "dependencies = [\"a\"]\n");

    let err = test.app.boot().await.unwrap_err();
    assert_eq!(err.kind, corekit_core::error::ErrorKind::CyclicDependency);
    assert!(order.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_manifest_without_factory_is_skipped() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let test = helpers::TestApp::with_catalogs(
        json!({}),
        recording_catalog(order.clone(), &["cache"]),
        corekit::command_catalog(),
    );
    test.write("modules/cache.toml", "");
    test.write("modules/ghost.toml", "");

    test.app.boot().await.unwrap();

    assert!(test.app.is_module_registered("cache").await);
    assert!(!test.app.is_module_registered("ghost").await);
}

#[tokio::test]
async fn test_excluded_manifests_are_not_mounted() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let test = helpers::TestApp::with_catalogs(
        json!({ "loader": { "exclude": ["*.disabled.toml"] } }),
        recording_catalog(order.clone(), &["cache", "legacy.disabled"]),
        corekit::command_catalog(),
    );
    test.write("modules/cache.toml", "");
    test.write("modules/legacy.disabled.toml", "");

    test.app.boot().await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["cache"]);
}

#[tokio::test]
async fn test_module_commands_autoload() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let test = helpers::TestApp::with_catalogs(
        json!({ "app": { "autoload_module_commands": true } }),
        recording_catalog(order.clone(), &["jobs"]),
        corekit::command_catalog(),
    );
    test.write("modules/jobs/module.toml", "");
    test.write("modules/jobs/commands/ping.toml", "");

    test.app.boot().await.unwrap();

    assert!(test.app.is_module_registered("jobs").await);
    assert!(test.app.has_command("ping"));
}

#[tokio::test]
async fn test_module_commands_ignored_without_autoload() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let test = helpers::TestApp::with_catalogs(
        json!({}),
        recording_catalog(order.clone(), &["jobs"]),
        corekit::command_catalog(),
    );
    test.write("modules/jobs/module.toml", "");
    test.write("modules/jobs/commands/ping.toml", "");

    test.app.boot().await.unwrap();
    assert!(!test.app.has_command("ping"));

    let loaded = test
        .app
        .load_module_commands(&test.modules_dir().join("jobs").to_string_lossy())
        .await
        .unwrap();
    assert_eq!(loaded, 1);
    assert!(test.app.has_command("ping"));

    let again = test
        .app
        .load_module_commands(&test.modules_dir().join("jobs").to_string_lossy())
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_autorun_runs_hook() {
    let test = helpers::TestApp::new(json!({ "app": { "autorun": true } }));
    let (_, complete) = test.app.bus().once(EventKey::parse("run.complete"));

    test.app.boot().await.unwrap();

    let payload = complete.await.unwrap();
    assert_eq!(payload.into_value(), json!({ "name": "test-app" }));
}
