//! Module registry: name to live instance map with waitable registration.
//!
//! Storing an instance and emitting `<name>.registered` happen under the
//! write lock; checking for an instance and subscribing to that event
//! happen under the read lock. A waiter therefore either sees the instance
//! or receives the event, never neither.

pub mod graph;
pub mod record;
pub mod tracker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{RwLock, oneshot};
use tracing::{debug, info, warn};

use corekit_core::error::AppError;
use corekit_core::events::EventKey;
use corekit_core::result::AppResult;
use corekit_core::traits::ModuleInstance;

use crate::bus::{EventBus, Payload};

pub use graph::{DependencyGraph, FrameGuard};
pub use record::{ModuleRecord, RecordState};
pub use tracker::{RegistrationTracker, TrackerOutcome};

/// Result of [`ModuleRegistry::watch`].
#[derive(Debug)]
pub enum Watch {
    /// Already registered.
    Ready(ModuleInstance),
    /// Fires with the instance on the next `<name>.registered`.
    Pending(oneshot::Receiver<Payload>),
}

/// Registry of module records.
#[derive(Debug)]
pub struct ModuleRegistry {
    /// Module name → record.
    records: RwLock<HashMap<String, ModuleRecord>>,
    /// Bus `<name>.registered` is emitted on.
    bus: Arc<EventBus<Payload>>,
}

impl ModuleRegistry {
    /// Creates an empty registry emitting on `bus`.
    pub fn new(bus: Arc<EventBus<Payload>>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Moves `name` to `Registering`. An already registered instance stays
    /// resolvable until it is replaced.
    pub async fn mark_registering(&self, name: &str, logger: tracing::Span) {
        let mut records = self.records.write().await;
        match records.get_mut(name) {
            Some(record) if record.is_registered() => {
                debug!(module = %name, "Re-registering module");
            }
            Some(record) => {
                record.state = RecordState::Registering;
                record.logger = logger;
            }
            None => {
                records.insert(name.to_string(), ModuleRecord::registering(name, logger));
            }
        }
    }

    /// Moves `name` to `Failed` unless an earlier instance is still live.
    pub async fn mark_failed(&self, name: &str) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(name) {
            if !record.is_registered() {
                record.state = RecordState::Failed;
            }
        }
    }

    /// Stores `instance` under `name` and emits `<name>.registered`.
    ///
    /// Returns the instance it replaced, if any. Replacing is allowed and
    /// logged as a warning.
    pub async fn insert(
        &self,
        name: &str,
        instance: ModuleInstance,
        logger: tracing::Span,
    ) -> Option<ModuleInstance> {
        let mut records = self.records.write().await;

        let previous = records
            .get(name)
            .and_then(|record| record.instance.clone());
        if previous.is_some() {
            warn!(module = %name, "Overriding already registered module");
        }

        records.insert(
            name.to_string(),
            ModuleRecord {
                name: name.to_string(),
                instance: Some(instance.clone()),
                state: RecordState::Registered,
                registered_at: Some(Utc::now()),
                logger,
            },
        );

        let notified = self
            .bus
            .emit(&EventKey::registered(name), Payload::Module(instance));
        info!(module = %name, listeners = notified, "Module registered");

        previous
    }

    /// Returns the registered instance of `name`.
    pub async fn get(&self, name: &str) -> Option<ModuleInstance> {
        let records = self.records.read().await;
        records.get(name).and_then(|record| record.instance.clone())
    }

    /// Returns a snapshot of the record of `name`.
    pub async fn record(&self, name: &str) -> Option<ModuleRecord> {
        let records = self.records.read().await;
        records.get(name).cloned()
    }

    /// Returns the state of `name`.
    pub async fn state(&self, name: &str) -> RecordState {
        let records = self.records.read().await;
        records
            .get(name)
            .map(|record| record.state)
            .unwrap_or(RecordState::Unregistered)
    }

    /// Whether an instance is available for `name`.
    pub async fn is_registered(&self, name: &str) -> bool {
        let records = self.records.read().await;
        records.get(name).is_some_and(ModuleRecord::is_registered)
    }

    /// Names with a live instance, sorted.
    pub async fn names(&self) -> Vec<String> {
        let records = self.records.read().await;
        let mut names: Vec<String> = records
            .values()
            .filter(|record| record.is_registered())
            .map(|record| record.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the instance of `name` if registered, otherwise a receiver for
    /// its next registration. Never times out.
    pub async fn watch(&self, name: &str) -> Watch {
        let records = self.records.read().await;
        match records.get(name).and_then(|record| record.instance.clone()) {
            Some(instance) => Watch::Ready(instance),
            None => Watch::Pending(self.bus.once(EventKey::registered(name)).1),
        }
    }

    /// Returns the instance of `name`, waiting up to `timeout` for it to be
    /// registered.
    pub async fn wait_for(&self, name: &str, timeout: Duration) -> AppResult<ModuleInstance> {
        let key = EventKey::registered(name);
        let (listener_id, receiver) = {
            let records = self.records.read().await;
            if let Some(instance) = records.get(name).and_then(|record| record.instance.clone()) {
                return Ok(instance);
            }
            self.bus.once(key.clone())
        };

        debug!(module = %name, timeout_ms = timeout.as_millis() as u64, "Waiting for module");

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(Payload::Module(instance))) => Ok(instance),
            Ok(Ok(_)) | Ok(Err(_)) => self.get(name).await.ok_or_else(|| {
                AppError::internal(format!("Registration event for \"{name}\" carried no module"))
            }),
            Err(_) => {
                self.bus.remove_listener(&key, listener_id);
                let err = AppError::resolve_timeout(name, timeout);
                tracing::error!(module = %name, "{}", err.message);
                Err(err)
            }
        }
    }
}
