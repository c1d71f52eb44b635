//! Integration tests for registration, resolution and hooks.

mod helpers;

use std::time::Duration;

use serde_json::{Value, json};

use corekit_core::error::ErrorKind;
use corekit_core::traits::{Module, ModuleInstance};
use corekit_runtime::Payload;
use corekit_runtime::bus::{ChainError, listener};
use corekit_runtime::commands::CommandCatalog;
use corekit_runtime::loader::{Factory, ModuleCatalog, ModuleConfig, init_fn};

struct Versioned(u32);
impl Module for Versioned {}

fn bare_app(settings: Value) -> helpers::TestApp {
    helpers::TestApp::with_catalogs(settings, ModuleCatalog::new(), CommandCatalog::new())
}

#[tokio::test(start_paused = true)]
async fn test_register_times_out_at_register_timeout() {
    let test = bare_app(json!({ "app": { "register_timeout_ms": 500 } }));
    let factory = Factory::init(init_fn(|_app, _config: ModuleConfig| async move {
        std::future::pending::<()>().await;
        Ok(None)
    }));

    let app = test.app.clone();
    let started = tokio::time::Instant::now();
    let handle = tokio::spawn(async move { app.register(factory, "slow").await });

    tokio::time::sleep(Duration::from_millis(499)).await;
    assert!(!handle.is_finished());

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::RegistrationTimeout);
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(!test.app.is_module_registered("slow").await);
}

#[tokio::test]
async fn test_duplicate_registration_last_write_wins() {
    let test = bare_app(json!({}));
    test.app
        .register(Factory::ready(Versioned(1)), "store")
        .await
        .unwrap();
    test.app
        .register(Factory::ready(Versioned(2)), "store")
        .await
        .unwrap();

    let store = test.app.resolve_as::<Versioned>("store").await.unwrap();
    assert_eq!(store.0, 2);
}

#[tokio::test]
async fn test_resolve_waits_for_late_registration() {
    let test = bare_app(json!({ "app": { "resolve_timeout_ms": 5000 } }));

    let app = test.app.clone();
    let pending = tokio::spawn(async move { app.resolve("late").await });
    tokio::task::yield_now().await;

    let registered = test
        .app
        .register(Factory::ready(Versioned(7)), "late")
        .await
        .unwrap();
    let resolved = pending.await.unwrap().unwrap();
    assert!(resolved.ptr_eq(&registered));
}

#[tokio::test(start_paused = true)]
async fn test_resolve_times_out() {
    let test = bare_app(json!({ "app": { "resolve_timeout_ms": 250 } }));
    let err = test.app.resolve("missing").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResolveTimeout);
}

#[tokio::test]
async fn test_dependent_init_resolves_its_dependency() {
    let test = bare_app(json!({}));
    let factory = Factory::init(init_fn(|app, config: ModuleConfig| async move {
        let deps = app.solve_dependencies(&config.moduleid, &["base"]).await?;
        let base = deps[0].downcast::<Versioned>().map_or(0, |base| base.0);
        Ok(Some(ModuleInstance::new(Versioned(base + 1))))
    }));

    let app = test.app.clone();
    let dependent = tokio::spawn(async move { app.register(factory, "derived").await });
    test.app
        .register(Factory::ready(Versioned(41)), "base")
        .await
        .unwrap();
    dependent.await.unwrap().unwrap();

    let derived = test.app.resolve_as::<Versioned>("derived").await.unwrap();
    assert_eq!(derived.0, 42);
}

#[tokio::test]
async fn test_hook_pre_and_post_reduce() {
    let test = bare_app(json!({}));
    let add = |step: i64| {
        listener(move |payload: Payload| async move {
            let n = payload.as_value().and_then(|v| v["n"].as_i64()).unwrap_or(0);
            Ok(Some(Payload::Value(json!({ "n": n + step }))))
        })
    };
    test.app.on("save.pre", add(1));
    test.app.on("save.post", add(1));

    let out = test.app.hook("save", json!({ "n": 1 })).await.unwrap();
    assert_eq!(out, json!({ "n": 3 }));
}

#[tokio::test]
async fn test_hook_reaches_main_listeners_of_dotted_name() {
    let test = bare_app(json!({}));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    test.app.on(
        "media.ready",
        listener(move |payload: Payload| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(payload.into_value());
                Ok(None)
            }
        }),
    );

    let out = test.app.hook("media.ready", json!({ "id": 9 })).await.unwrap();

    assert_eq!(out, json!({ "id": 9 }));
    assert_eq!(rx.try_recv().unwrap(), json!({ "id": 9 }));
}

#[tokio::test]
async fn test_hook_failure_propagates() {
    let test = bare_app(json!({}));
    test.app.on(
        "save",
        listener(|_payload: Payload| async move {
            Err(corekit_core::error::AppError::internal("disk full"))
        }),
    );

    let err = test.app.hook("save", json!({})).await.unwrap_err();
    assert!(err.to_string().contains("disk full"));
}

#[tokio::test]
async fn test_chain_events_resolves_in_firing_order() {
    let test = bare_app(json!({}));
    let app = test.app.clone();
    let waiting = tokio::spawn(async move {
        app.chain_events(&["db.ready", "cache.ready"], &["boot.failed"])
            .await
            .map(|payloads| payloads.into_iter().map(Payload::into_value).collect::<Vec<_>>())
    });
    tokio::task::yield_now().await;

    test.app.emit("cache.ready", Payload::Value(json!("cache")));
    test.app.emit("db.ready", Payload::Value(json!("db")));
    test.app.emit("cache.ready", Payload::Value(json!("again")));

    let payloads = waiting.await.unwrap().unwrap();
    assert_eq!(payloads, vec![json!("cache"), json!("db")]);
}

#[tokio::test]
async fn test_chain_events_reject_wins() {
    let test = bare_app(json!({}));
    let app = test.app.clone();
    let waiting = tokio::spawn(async move {
        match app.chain_events(&["db.ready"], &["boot.failed"]).await {
            Err(ChainError::Rejected { event, payload }) => Some((event.to_string(), payload.into_value())),
            _ => None,
        }
    });
    tokio::task::yield_now().await;

    test.app.emit("boot.failed", Payload::Value(json!({ "reason": "db" })));

    let rejected = waiting.await.unwrap();
    assert_eq!(
        rejected,
        Some(("boot.failed".to_string(), json!({ "reason": "db" })))
    );
    assert_eq!(test.app.emit("db.ready", Payload::Empty), 0);
}

#[tokio::test]
async fn test_close_emits_closing_payload() {
    let test = bare_app(json!({}));
    let (_, closing) = test
        .app
        .bus()
        .once(corekit_core::events::EventKey::closing());

    test.app.close(0, "SIGINT").await;

    let payload = closing.await.unwrap();
    assert_eq!(payload.into_value(), json!({ "code": 0, "label": "SIGINT" }));
}
