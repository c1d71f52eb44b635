//! Binds commands to event types and routes their replies.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use corekit_core::error::AppError;
use corekit_core::events::EventKey;
use corekit_core::result::AppResult;
use corekit_core::types::{DEFAULT_UID_LEN, get_uid};

use super::event::{CommandEvent, CommandReply};
use super::handler::Command;
use crate::bus::{EventBus, ListenerId, Payload, listener};

/// A command bound to an event type.
#[derive(Clone)]
pub struct CommandBinding {
    /// Binding id, the key for reload and removal.
    pub id: String,
    /// Event type the command listens on.
    pub event_type: String,
    /// Whether the binding refused to share its event type.
    pub unique: bool,
    listener_id: ListenerId,
    handler: Arc<dyn Command>,
}

impl CommandBinding {
    /// The bound command.
    pub fn handler(&self) -> &Arc<dyn Command> {
        &self.handler
    }
}

impl fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBinding")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("unique", &self.unique)
            .field("listener_id", &self.listener_id)
            .finish_non_exhaustive()
    }
}

/// Command dispatcher over the application bus.
pub struct CommandDispatcher {
    bus: Arc<EventBus<Payload>>,
    /// Binding id → binding.
    bindings: Mutex<HashMap<String, CommandBinding>>,
    this: Weak<CommandDispatcher>,
}

impl CommandDispatcher {
    /// Creates a dispatcher listening on `bus`.
    pub fn new(bus: Arc<EventBus<Payload>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            bus,
            bindings: Mutex::new(HashMap::new()),
            this: this.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CommandBinding>> {
        self.bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Binds `handler` to `event_type` and returns the binding id.
    ///
    /// With `unique` set, nothing is bound when `event_type` already has a
    /// listener; the refusal is logged and `None` returned. Without an `id`
    /// one is generated. Reusing an id replaces the earlier binding.
    pub fn command(
        &self,
        event_type: &str,
        handler: Arc<dyn Command>,
        id: Option<&str>,
        unique: bool,
    ) -> Option<String> {
        debug!(command = %event_type, "Registering command handler");
        let key = EventKey::parse(event_type);
        let mut bindings = self.lock();

        if unique && !self.bus.handlers(&key).is_empty() {
            warn!(
                command = %event_type,
                "Event type already has a listener and the command is marked unique"
            );
            return None;
        }

        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| get_uid(DEFAULT_UID_LEN));
        let binding = self.bind(&id, event_type, unique, handler);

        if let Some(previous) = bindings.insert(id.clone(), binding) {
            warn!(command = %event_type, id = %id, "Replacing command binding with the same id");
            self.bus
                .remove_listener(&EventKey::parse(&previous.event_type), previous.listener_id);
        }
        Some(id)
    }

    /// Swaps the handler of binding `id`, keeping its event type and
    /// uniqueness.
    pub fn reload_command(&self, id: &str, handler: Arc<dyn Command>) -> AppResult<()> {
        let mut bindings = self.lock();
        let Some(previous) = bindings.remove(id) else {
            return Err(AppError::command(format!("No command bound with id \"{id}\"")));
        };

        self.bus
            .remove_listener(&EventKey::parse(&previous.event_type), previous.listener_id);
        let binding = self.bind(id, &previous.event_type, previous.unique, handler);
        bindings.insert(id.to_string(), binding);

        debug!(command = %previous.event_type, id = %id, "Command reloaded");
        Ok(())
    }

    /// Drops binding `id`. Returns whether it existed.
    pub fn remove_command(&self, id: &str) -> bool {
        let Some(binding) = self.lock().remove(id) else {
            return false;
        };
        self.bus
            .remove_listener(&EventKey::parse(&binding.event_type), binding.listener_id);
        true
    }

    /// Whether any command is bound to `event_type`.
    pub fn has_command(&self, event_type: &str) -> bool {
        self.lock()
            .values()
            .any(|binding| binding.event_type == event_type)
    }

    /// Snapshot of all bindings, sorted by id.
    pub fn bindings(&self) -> Vec<CommandBinding> {
        let mut bindings: Vec<CommandBinding> = self.lock().values().cloned().collect();
        bindings.sort_by(|a, b| a.id.cmp(&b.id));
        bindings
    }

    /// Emits `event` on `event_type`. Returns how many listeners were notified.
    pub fn dispatch(&self, event_type: &str, event: CommandEvent) -> usize {
        self.bus
            .emit(&EventKey::parse(event_type), Payload::Command(event))
    }

    fn bind(
        &self,
        id: &str,
        event_type: &str,
        unique: bool,
        handler: Arc<dyn Command>,
    ) -> CommandBinding {
        let dispatcher = self.this.clone();
        let command = handler.clone();
        let bound_type = event_type.to_string();

        let listener_id = self.bus.on(
            EventKey::parse(event_type),
            listener(move |payload: Payload| {
                let dispatcher = dispatcher.clone();
                let command = command.clone();
                let event_type = bound_type.clone();
                async move {
                    if let Some(dispatcher) = dispatcher.upgrade() {
                        dispatcher.execute(&event_type, command, payload).await;
                    }
                    Ok(None)
                }
            }),
        );

        CommandBinding {
            id: id.to_string(),
            event_type: event_type.to_string(),
            unique,
            listener_id,
            handler,
        }
    }

    /// Fills in the fields the caller left out.
    fn make_event(&self, event_type: &str, payload: Payload) -> CommandEvent {
        let mut event = match payload {
            Payload::Command(event) => event,
            Payload::Value(data) => CommandEvent::new(data),
            Payload::Empty | Payload::Module(_) => CommandEvent::new(Value::Null),
        };
        if event.event_type.is_none() {
            event.event_type = Some(event_type.to_string());
        }
        if event.context.is_none() {
            event.context = Some(self.this.clone());
        }
        if event.id.is_none() {
            event.id = Some(get_uid(DEFAULT_UID_LEN));
        }
        event
    }

    async fn execute(&self, event_type: &str, command: Arc<dyn Command>, payload: Payload) {
        let event = self.make_event(event_type, payload);
        let id = event.id().to_string();
        let kind = event.event_type().to_string();
        let responder = event.respond_to.clone();
        debug!(command = %event_type, id = %id, "Executing command");

        let result = match AssertUnwindSafe(command.execute(event)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(AppError::command(format!(
                "Command \"{event_type}\" panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        match result {
            Ok(None) | Ok(Some(Value::Null)) => {}
            Ok(Some(response)) => {
                let reply = CommandReply::success(id, kind, response);
                match responder {
                    Some(responder) => {
                        responder.respond(reply);
                    }
                    None => {
                        self.bus
                            .emit(&EventKey::done(event_type), Payload::Value(reply.to_value()));
                    }
                }
            }
            Err(err) => {
                error!(command = %event_type, id = %id, error = %err, "Error executing command");
                let reply = CommandReply::failure(id, kind, &err);
                match responder {
                    Some(responder) => {
                        responder.respond(reply);
                    }
                    None => {
                        self.bus
                            .emit(&EventKey::error(event_type), Payload::Value(reply.to_value()));
                    }
                }
            }
        }
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("bindings", &self.lock().len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
