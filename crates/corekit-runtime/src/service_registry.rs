//! Best-effort announcement of the application to a service registry.
//!
//! `POST {url}/api/register` with the registration data, and
//! `POST {url}/api/unregister` on shutdown. A successful registration returns
//! a session identifier that is sent along with every later call. Failures
//! are logged and never propagated.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use corekit_core::config::{AppConfig, ConfigTree};

#[derive(Debug, Default, Deserialize)]
struct RegistryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    value: RegistryValue,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryValue {
    #[serde(default)]
    identifier: Option<String>,
}

/// HTTP client for the service registry.
#[derive(Debug)]
pub struct ServiceRegistryClient {
    client: Client,
    url: String,
    /// Session identifier handed out by the registry.
    identifier: Mutex<Option<String>>,
}

impl ServiceRegistryClient {
    /// Creates a client for the registry at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            identifier: Mutex::new(None),
        }
    }

    /// The session identifier from the last successful registration.
    pub fn identifier(&self) -> Option<String> {
        self.identifier
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_identifier(&self, identifier: Option<String>) {
        *self
            .identifier
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = identifier;
    }

    /// Builds the registration body: known ports from the config tree,
    /// overlaid with `registration.data`, then `appId`, `environment` and
    /// `hostname` when not already set.
    pub fn registration_data(config: &AppConfig, tree: &ConfigTree) -> Value {
        let mut data = Map::new();
        for section in ["repl", "server"] {
            if let Some(port) = tree.lookup(&format!("{section}.port")) {
                data.insert(section.to_string(), json!({ "port": port }));
            }
        }

        if let Value::Object(extra) = &config.registration.data {
            for (key, value) in extra {
                data.insert(key.clone(), value.clone());
            }
        }

        data.entry("appId")
            .or_insert_with(|| Value::String(config.app.name.clone()));
        data.entry("environment")
            .or_insert_with(|| Value::String(config.app.environment.clone()));
        if let Some(hostname) = config
            .registration
            .hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
        {
            data.entry("hostname").or_insert(Value::String(hostname));
        }

        Value::Object(data)
    }

    /// Registers (`register = true`) or deregisters the application.
    pub async fn announce(&self, data: &Value, register: bool) {
        let endpoint = if register { "register" } else { "unregister" };
        let url = format!("{}/api/{endpoint}", self.url);

        let mut body = if register {
            data.clone()
        } else {
            Value::Object(Map::new())
        };
        if let (Some(identifier), Value::Object(map)) = (self.identifier(), &mut body) {
            map.insert("identifier".to_string(), Value::String(identifier));
        }

        info!(url = %url, "Announcing application to service registry");
        debug!(body = %body, "Registry request body");

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                info!(url = %url, "Registry service down, unable to register");
                return;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Error registering application");
                return;
            }
        };

        if !register {
            return;
        }

        match response.json::<RegistryResponse>().await {
            Ok(result) if result.success => {
                info!(identifier = ?result.value.identifier, "Registered with service registry");
                self.set_identifier(result.value.identifier);
            }
            Ok(_) => {
                warn!(url = %url, "Service registry refused registration");
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Invalid service registry response");
            }
        }
    }
}
