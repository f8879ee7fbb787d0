//! Configuration types for the moderation live event client

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LiveClientError, Result};

/// Client configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub live: LiveConfig,
}

/// Live event connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Origin of the admin page, e.g. `https://moderation.example.com`
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Configuration for automatic reconnection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection when the connection drops
    #[serde(default = "default_reconnect_enabled")]
    pub enabled: bool,
    /// Maximum number of consecutive reconnection attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay before each reconnection attempt
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconnect_enabled(),
            max_retries: default_max_retries(),
            delay: default_retry_delay(),
        }
    }
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(3000)
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            path: default_path(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

fn default_origin() -> String {
    "http://localhost:3001".to_string()
}

fn default_path() -> String {
    "/ws".to_string()
}

impl LiveConfig {
    /// WebSocket URL for the live event endpoint.
    ///
    /// The scheme follows the page origin: `https` pages use `wss`,
    /// `http` pages use `ws`.
    pub fn ws_url(&self) -> Result<String> {
        let origin = self.origin.trim_end_matches('/');
        let (scheme, host) = if let Some(host) = origin.strip_prefix("https://") {
            ("wss", host)
        } else if let Some(host) = origin.strip_prefix("http://") {
            ("ws", host)
        } else {
            return Err(LiveClientError::InvalidConfig(format!(
                "origin must start with http:// or https://, got '{}'",
                self.origin
            )));
        };

        if host.is_empty() {
            return Err(LiveClientError::InvalidConfig(format!(
                "origin '{}' has no host",
                self.origin
            )));
        }

        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        Ok(format!("{}://{}{}", scheme, host, path))
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &PathBuf) -> std::result::Result<Config, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
