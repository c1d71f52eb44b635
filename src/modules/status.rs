//! Built-in commands.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::{Value, json};

use corekit_runtime::prelude::*;

/// Reports the application name, environment and registered modules.
pub struct StatusCommand {
    app: Weak<Application>,
}

impl StatusCommand {
    pub fn new(app: &Arc<Application>) -> Self {
        Self {
            app: Arc::downgrade(app),
        }
    }
}

#[async_trait]
impl Command for StatusCommand {
    async fn execute(&self, _event: CommandEvent) -> AppResult<Option<Value>> {
        let Some(app) = self.app.upgrade() else {
            return Err(AppError::command("Application is shutting down"));
        };
        Ok(Some(json!({
            "name": app.name(),
            "environment": app.config().app.environment,
            "modules": app.registry().names().await,
        })))
    }
}

/// Answers `"pong"`, echoing any data.
pub fn ping() -> Arc<dyn Command> {
    command_fn(|event: CommandEvent| async move {
        Ok(Some(match event.data {
            Value::Null => json!("pong"),
            data => json!({ "pong": data }),
        }))
    })
}
