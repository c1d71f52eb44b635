//! Module and command loader settings.

use serde::{Deserialize, Serialize};

/// Where modules and commands are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Core module ids mounted first, resolved through the module catalog.
    #[serde(default = "default_core_modules")]
    pub core_modules: Vec<String>,
    /// Directory scanned for module manifests.
    #[serde(default = "default_modules")]
    pub modules: String,
    /// Directory scanned for command manifests.
    #[serde(default = "default_commands")]
    pub commands: String,
    /// Glob patterns of manifest file names to skip in the modules directory.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            core_modules: default_core_modules(),
            modules: default_modules(),
            commands: default_commands(),
            exclude: Vec::new(),
        }
    }
}

fn default_core_modules() -> Vec<String> {
    vec![
        "logger".to_string(),
        "dispatcher".to_string(),
        "repl".to_string(),
    ]
}

fn default_modules() -> String {
    "./modules".to_string()
}

fn default_commands() -> String {
    "./commands".to_string()
}
