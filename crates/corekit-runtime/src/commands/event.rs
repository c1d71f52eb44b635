//! Command events and at-most-once response delivery.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use corekit_core::error::AppError;

use super::dispatcher::CommandDispatcher;

/// What a command produced, as delivered to a responder or carried by
/// `<type>.done` / `<type>.error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    /// Id of the event that triggered the command.
    pub id: String,
    /// Event type of that event.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The command's output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// The error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandReply {
    /// Successful reply carrying `response`.
    pub fn success(id: impl Into<String>, event_type: impl Into<String>, response: Value) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            response: Some(response),
            error: None,
        }
    }

    /// Failed reply carrying the error message.
    pub fn failure(id: impl Into<String>, event_type: impl Into<String>, err: &AppError) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            response: None,
            error: Some(err.message.clone()),
        }
    }

    /// Whether this reply reports a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// JSON form of the reply.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

type ReplyFn = dyn Fn(CommandReply) + Send + Sync;

struct ResponderInner {
    handled: AtomicBool,
    reply: Box<ReplyFn>,
}

/// Callback attached to a command event. Clones share state: the callback
/// runs at most once across all of them.
#[derive(Clone)]
pub struct Responder {
    inner: Arc<ResponderInner>,
}

impl Responder {
    /// Wraps `reply`.
    pub fn new(reply: impl Fn(CommandReply) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ResponderInner {
                handled: AtomicBool::new(false),
                reply: Box::new(reply),
            }),
        }
    }

    /// A responder that forwards its single reply into a channel.
    pub fn channel() -> (Self, oneshot::Receiver<CommandReply>) {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let responder = Self::new(move |reply| {
            let sender = tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(sender) = sender {
                let _ = sender.send(reply);
            }
        });
        (responder, rx)
    }

    /// Delivers `reply` unless a reply was already delivered. Returns
    /// whether this call delivered it.
    pub fn respond(&self, reply: CommandReply) -> bool {
        if self.inner.handled.swap(true, Ordering::SeqCst) {
            return false;
        }
        (self.inner.reply)(reply);
        true
    }

    /// Whether a reply was delivered.
    pub fn is_handled(&self) -> bool {
        self.inner.handled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("handled", &self.is_handled())
            .finish()
    }
}

/// The event a command executes with.
///
/// Missing `id`, `event_type` and `context` are filled in by the dispatcher
/// before the command runs; values supplied by the caller are kept.
#[derive(Debug, Clone, Default)]
pub struct CommandEvent {
    /// Unique event id.
    pub id: Option<String>,
    /// Event type the command is bound to.
    pub event_type: Option<String>,
    /// Caller data.
    pub data: Value,
    /// The dispatcher running the command.
    pub context: Option<Weak<CommandDispatcher>>,
    /// Where the reply goes instead of `<type>.done`.
    pub respond_to: Option<Responder>,
}

impl CommandEvent {
    /// Event carrying `data`.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.respond_to = Some(responder);
        self
    }

    /// The event id, empty until the dispatcher assigned one.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// The event type, empty until the dispatcher assigned one.
    pub fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or_default()
    }

    /// The dispatcher running this command, while it is alive.
    pub fn dispatcher(&self) -> Option<Arc<CommandDispatcher>> {
        self.context.as_ref().and_then(Weak::upgrade)
    }
}
