// ABOUTME: Configuration parsing from TOML file with environment variable overrides.
// ABOUTME: Validates the server URL and provides defaults for optional fields.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint of the sync server (ws:// or wss://)
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Seconds to wait for the connection handshake before giving up
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Capacity of the outbound command channel
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_server_url() -> String {
    "ws://localhost:5000/ws".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_outbound_buffer() -> usize {
    64
}

impl Config {
    /// Load configuration from config.toml (or `DESKWIRE_CONFIG_PATH`) with
    /// environment variable overrides applied afterwards.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("DESKWIRE_CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path. A missing file yields the
    /// default config; overrides still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Config {
                server: ServerConfig::default(),
            }
        };

        // Override with environment variables if present
        if let Ok(val) = std::env::var("DESKWIRE_SERVER_URL") {
            config.server.url = val;
        }
        if let Ok(val) = std::env::var("DESKWIRE_CONNECT_TIMEOUT_SECS") {
            config.server.connect_timeout_secs = val.parse().with_context(|| {
                format!(
                    "DESKWIRE_CONNECT_TIMEOUT_SECS must be a number, got: {}",
                    val
                )
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server.url)
            .with_context(|| format!("Invalid server URL: {}", self.server.url))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            bail!(
                "Server URL must use ws:// or wss://, got: {}",
                self.server.url
            );
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
