//! Application configuration schemas.
//!
//! Configuration is merged from TOML files and environment variables via
//! the `config` crate. The merged result is kept twice: as the typed
//! [`AppConfig`] the runtime reads its own settings from, and as the
//! untyped [`ConfigTree`] modules receive their per-module slice from.

pub mod app;
pub mod loader;
pub mod logging;
pub mod registration;
pub mod tree;

use serde::{Deserialize, Serialize};

use self::app::ApplicationConfig;
use self::loader::LoaderConfig;
use self::logging::LoggingConfig;
use self::registration::RegistrationConfig;
pub use self::tree::ConfigTree;

use crate::error::AppError;

/// Prefix for environment variable overrides (`COREKIT__APP__NAME=...`).
pub const ENV_PREFIX: &str = "COREKIT";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Runtime behaviour of the application context.
    #[serde(default)]
    pub app: ApplicationConfig,
    /// Where and what to load.
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Service registry announcement settings.
    #[serde(default)]
    pub registration: RegistrationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `<dir>/default` with an environment-specific overlay
    /// `<dir>/<env>` and environment variables prefixed with `COREKIT`.
    /// Returns the typed settings together with the full config tree.
    pub fn load(dir: &str, env: &str) -> Result<(Self, ConfigTree), AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let root: serde_json::Value = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        let tree = ConfigTree::new(root);
        let mut settings = Self::from_tree(&tree)?;
        if !tree.has("app.environment") {
            settings.app.environment = env.to_string();
        }
        Ok((settings, tree))
    }

    /// Extract the typed settings from an already merged tree.
    pub fn from_tree(tree: &ConfigTree) -> Result<Self, AppError> {
        serde_json::from_value(tree.root().clone())
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
