//! Application context settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings that drive the application context itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Name of the application instance, sent to the service registry and
    /// passed to the `run` hook.
    #[serde(default = "default_name")]
    pub name: String,
    /// Runtime environment (`development`, `production`, ...).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Critical errors terminate the process with exit code 1.
    #[serde(default = "default_true")]
    pub exit_on_error: bool,
    /// Run the `run` hook as soon as the boot sequence completes.
    #[serde(default)]
    pub autorun: bool,
    /// Mount the `commands` directory of every module that declares one.
    #[serde(default)]
    pub autoload_module_commands: bool,
    /// Upper bound for a module factory to settle, in milliseconds.
    #[serde(default = "default_register_timeout")]
    pub register_timeout_ms: u64,
    /// Upper bound for `resolve` to wait on a registration, in milliseconds.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_ms: u64,
}

impl ApplicationConfig {
    /// Registration timeout as a `Duration`.
    pub fn register_timeout(&self) -> Duration {
        Duration::from_millis(self.register_timeout_ms)
    }

    /// Resolve timeout as a `Duration`.
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    /// Whether the application runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            environment: default_environment(),
            exit_on_error: true,
            autorun: false,
            autoload_module_commands: false,
            register_timeout_ms: default_register_timeout(),
            resolve_timeout_ms: default_resolve_timeout(),
        }
    }
}

fn default_name() -> String {
    "Application".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}

fn default_register_timeout() -> u64 {
    10 * 1000
}

fn default_resolve_timeout() -> u64 {
    40 * 1000
}
