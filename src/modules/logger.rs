//! Logger module: hands out child spans to other modules.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::Span;

use corekit_runtime::prelude::*;

#[derive(Debug, Clone, Deserialize)]
struct LoggerSettings {
    #[serde(default = "default_level")]
    level: String,
}

fn default_level() -> String {
    "info".to_string()
}

/// The registered logger.
#[derive(Debug)]
pub struct Logger {
    level: String,
    span: Mutex<Span>,
}

impl Logger {
    fn new(level: String) -> Self {
        Self {
            level,
            span: Mutex::new(Span::none()),
        }
    }

    /// Configured level.
    pub fn level(&self) -> &str {
        &self.level
    }

    /// A span for `name` nested under the logger's own span.
    pub fn child(&self, name: &str) -> Span {
        let parent = self
            .span
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        tracing::info_span!(parent: &parent, "logger", name = %name)
    }
}

impl Module for Logger {
    fn attach_logger(&self, span: Span) {
        *self
            .span
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = span;
    }
}

/// Builds the [`Logger`].
pub struct LoggerInit;

#[async_trait]
impl Initializable for LoggerInit {
    async fn init(
        &self,
        _context: Arc<Application>,
        config: ModuleConfig,
    ) -> AppResult<Option<ModuleInstance>> {
        let settings: LoggerSettings = config.parse()?;
        tracing::debug!(level = %settings.level, "Logger ready");
        Ok(Some(ModuleInstance::new(Logger::new(settings.level))))
    }
}
