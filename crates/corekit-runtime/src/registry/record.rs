//! Per-module registration record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corekit_core::traits::ModuleInstance;

/// Registration state of a module name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Never seen by `register`.
    Unregistered,
    /// Factory is running.
    Registering,
    /// Instance is available.
    Registered,
    /// Factory failed or timed out.
    Failed,
}

/// What the registry knows about one module name.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Sanitized module name.
    pub name: String,
    /// The live instance, once registered.
    pub instance: Option<ModuleInstance>,
    /// Current state.
    pub state: RecordState,
    /// When the current instance was stored.
    pub registered_at: Option<DateTime<Utc>>,
    /// The module's child logger.
    pub logger: tracing::Span,
}

impl ModuleRecord {
    /// A record for a name whose factory just started.
    pub fn registering(name: impl Into<String>, logger: tracing::Span) -> Self {
        Self {
            name: name.into(),
            instance: None,
            state: RecordState::Registering,
            registered_at: None,
            logger,
        }
    }

    /// Whether an instance is available.
    pub fn is_registered(&self) -> bool {
        self.state == RecordState::Registered && self.instance.is_some()
    }
}
