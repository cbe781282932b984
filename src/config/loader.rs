//! Load resource manifests from JSON files and server settings from the environment.

use crate::config::{ResourceConfig, DEFAULT_DRIVER_TIMEOUT_MS};
use crate::error::ConfigError;
use std::path::Path;
use std::time::Duration;

/// Read a resource manifest. Driver, model and hooks are bound afterwards in code.
pub fn load_resource_config(path: impl AsRef<Path>) -> Result<ResourceConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_resource_config(&text).map_err(|e| match e {
        ConfigError::Load(msg) => ConfigError::Load(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// The manifest must be a JSON object.
pub fn parse_resource_config(text: &str) -> Result<ResourceConfig, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
    if !value.is_object() {
        return Err(ConfigError::Load("resource manifest must be a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| ConfigError::Load(e.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub driver_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: "127.0.0.1:3000".into(),
            driver_timeout: Duration::from_millis(DEFAULT_DRIVER_TIMEOUT_MS),
        }
    }
}

impl ServerSettings {
    /// Reads `BIND_ADDR` and `DRIVER_TIMEOUT_MS`, loading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerSettings::default();
        let bind_addr = lookup("BIND_ADDR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.bind_addr);
        let driver_timeout = match lookup("DRIVER_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Load(format!("DRIVER_TIMEOUT_MS: invalid value '{}'", raw)))?;
                Duration::from_millis(ms)
            }
            None => defaults.driver_timeout,
        };
        Ok(ServerSettings {
            bind_addr,
            driver_timeout,
        })
    }
}

/// Install the fmt subscriber, honoring `RUST_LOG` over `default_directives`.
pub fn init_tracing(default_directives: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directives));
    // A subscriber installed earlier (tests, embedding apps) wins.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
