//! Integration tests for command loading and dispatch.

mod helpers;

use serde_json::json;

use corekit_core::events::EventKey;
use corekit_core::traits::Module;
use corekit_runtime::Payload;
use corekit_runtime::commands::{CommandEvent, Responder, command_fn};
use corekit_runtime::loader::Factory;

struct Marker;
impl Module for Marker {}

#[tokio::test]
async fn test_commands_directory_binds_manifests() {
    let test = helpers::TestApp::new(json!({}));
    test.write("commands/status.toml", "");
    test.write("commands/health-check.toml", "command = \"ping\"\nevent = \"health\"\n");
    test.write("commands/unknown.toml", "");

    let count = test.app.load_commands(&test.commands_dir()).await.unwrap();
    assert_eq!(count, 2);
    assert!(test.app.has_command("status"));
    assert!(test.app.has_command("health"));
    assert!(!test.app.has_command("unknown"));

    let ids: Vec<String> = test
        .app
        .dispatcher()
        .bindings()
        .into_iter()
        .map(|binding| binding.id)
        .collect();
    assert_eq!(ids, vec!["healthCheck", "status"]);
}

#[tokio::test]
async fn test_status_command_replies_through_responder() {
    let test = helpers::TestApp::new(json!({ "app": { "environment": "staging" } }));
    test.write("commands/status.toml", "");
    test.app.boot().await.unwrap();
    test.app
        .register(Factory::ready(Marker), "cache")
        .await
        .unwrap();

    let (responder, reply) = Responder::channel();
    let event = CommandEvent::new(json!(null))
        .with_id("req-1")
        .with_responder(responder);
    assert_eq!(test.app.dispatcher().dispatch("status", event), 1);

    let reply = reply.await.unwrap();
    assert_eq!(reply.id, "req-1");
    assert_eq!(reply.event_type, "status");
    assert_eq!(
        reply.response,
        Some(json!({
            "name": "test-app",
            "environment": "staging",
            "modules": ["cache"],
        }))
    );
}

#[tokio::test]
async fn test_reply_without_responder_emits_done() {
    let test = helpers::TestApp::new(json!({}));
    test.write("commands/ping.toml", "");
    test.app.load_commands(&test.commands_dir()).await.unwrap();

    let (_, done) = test.app.bus().once(EventKey::done("ping"));
    test.app
        .dispatcher()
        .dispatch("ping", CommandEvent::new(json!({ "seq": 3 })).with_id("p-1"));

    let payload = done.await.unwrap().into_value();
    assert_eq!(
        payload,
        json!({ "id": "p-1", "type": "ping", "response": { "pong": { "seq": 3 } } })
    );
}

#[tokio::test]
async fn test_failing_command_emits_error() {
    let test = helpers::TestApp::new(json!({}));
    test.app.command(
        "explode",
        command_fn(|_event: CommandEvent| async move {
            Err(corekit_core::error::AppError::command("boom"))
        }),
        Some("explode"),
        false,
    );

    let (_, failed) = test.app.bus().once(EventKey::error("explode"));
    test.app
        .dispatcher()
        .dispatch("explode", CommandEvent::new(json!(null)).with_id("e-1"));

    let payload = failed.await.unwrap().into_value();
    assert_eq!(payload["id"], json!("e-1"));
    assert!(payload["error"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn test_unique_command_refuses_second_binding() {
    let test = helpers::TestApp::new(json!({}));
    let first = test.app.command(
        "deploy",
        command_fn(|_event: CommandEvent| async move { Ok(None) }),
        None,
        true,
    );
    let second = test.app.command(
        "deploy",
        command_fn(|_event: CommandEvent| async move { Ok(None) }),
        None,
        true,
    );

    assert_eq!(first.map(|id| id.len()), Some(20));
    assert!(second.is_none());
}

#[tokio::test]
async fn test_reload_swaps_handler_in_place() {
    let test = helpers::TestApp::new(json!({}));
    test.app.command(
        "version",
        command_fn(|_event: CommandEvent| async move { Ok(Some(json!(1))) }),
        Some("version"),
        false,
    );
    test.app
        .reload_command(
            "version",
            command_fn(|_event: CommandEvent| async move { Ok(Some(json!(2))) }),
        )
        .unwrap();

    let (responder, reply) = Responder::channel();
    let listeners = test
        .app
        .dispatcher()
        .dispatch("version", CommandEvent::new(json!(null)).with_responder(responder));
    assert_eq!(listeners, 1);
    assert_eq!(reply.await.unwrap().response, Some(json!(2)));

    assert!(test.app.remove_command("version"));
    assert!(!test.app.has_command("version"));
    assert!(test.app.reload_command("version", command_fn(|_e: CommandEvent| async move { Ok(None) })).is_err());
}

#[tokio::test]
async fn test_commands_ready_without_directory() {
    let test = helpers::TestApp::new(json!({}));
    let (_, ready) = test.app.bus().once(EventKey::commands_ready());

    let count = test.app.load_commands(&test.commands_dir()).await.unwrap();

    assert_eq!(count, 0);
    assert!(matches!(ready.await, Ok(Payload::Empty)));
}
