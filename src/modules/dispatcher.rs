//! Dispatcher module: exposes the application's command dispatcher to
//! other modules.

use std::sync::Arc;

use async_trait::async_trait;

use corekit_runtime::commands::CommandDispatcher;
use corekit_runtime::prelude::*;

/// The registered dispatcher.
#[derive(Debug)]
pub struct Dispatcher {
    inner: Arc<CommandDispatcher>,
}

impl Dispatcher {
    /// Emits `event` on `event_type`.
    pub fn dispatch(&self, event_type: &str, event: CommandEvent) -> usize {
        self.inner.dispatch(event_type, event)
    }

    /// Whether a command is bound to `event_type`.
    pub fn has_command(&self, event_type: &str) -> bool {
        self.inner.has_command(event_type)
    }
}

impl Module for Dispatcher {}

/// Builds the [`Dispatcher`] once the logger is available.
pub struct DispatcherInit;

#[async_trait]
impl Initializable for DispatcherInit {
    async fn init(
        &self,
        context: Arc<Application>,
        config: ModuleConfig,
    ) -> AppResult<Option<ModuleInstance>> {
        context.solve_dependencies(&config.moduleid, &["logger"]).await?;
        tracing::debug!("Dispatcher ready");
        Ok(Some(ModuleInstance::new(Dispatcher {
            inner: context.dispatcher().clone(),
        })))
    }
}
