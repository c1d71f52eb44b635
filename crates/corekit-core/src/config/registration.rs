//! Service registry announcement settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings for announcing the application to a service registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Whether to announce at all.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the registry; `/api/register` and `/api/unregister` are appended.
    #[serde(default = "default_url")]
    pub url: String,
    /// Extra data merged into the registration body.
    #[serde(default = "default_data")]
    pub data: Value,
    /// Hostname to announce; defaults to the machine hostname.
    #[serde(default)]
    pub hostname: Option<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_url(),
            data: default_data(),
            hostname: None,
        }
    }
}

fn default_url() -> String {
    "http://localhost:7331".to_string()
}

fn default_data() -> Value {
    Value::Object(serde_json::Map::new())
}
