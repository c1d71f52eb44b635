//! Payload carried by the application event bus.

use serde_json::Value;

use corekit_core::traits::ModuleInstance;

use crate::commands::event::CommandEvent;

/// Everything the application emits on its bus.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No data.
    #[default]
    Empty,
    /// Arbitrary JSON data (hook arguments, command responses).
    Value(Value),
    /// A registered module, carried by `<name>.registered`.
    Module(ModuleInstance),
    /// A command invocation, carried by a command's event type.
    Command(CommandEvent),
}

impl Payload {
    /// Returns the JSON value, if this is a value payload.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Converts into JSON. Non-value payloads become `null`.
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            _ => Value::Null,
        }
    }

    /// Returns the module, if this is a module payload.
    pub fn as_module(&self) -> Option<&ModuleInstance> {
        match self {
            Self::Module(module) => Some(module),
            _ => None,
        }
    }

    /// Returns the command event, if this is a command payload.
    pub fn as_command(&self) -> Option<&CommandEvent> {
        match self {
            Self::Command(event) => Some(event),
            _ => None,
        }
    }

    /// Whether this is [`Payload::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ModuleInstance> for Payload {
    fn from(module: ModuleInstance) -> Self {
        Self::Module(module)
    }
}

impl From<CommandEvent> for Payload {
    fn from(event: CommandEvent) -> Self {
        Self::Command(event)
    }
}
