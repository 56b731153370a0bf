//! Demo configuration.
//!
//! Optional TOML file; every field has a default so an empty (or missing)
//! file yields a working setup. Command-line flags override the address
//! and protocol.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use portico_core::constants::{DEFAULT_HEARTBEAT, DEFAULT_LOGIN_WAIT, DEFAULT_READ_WAIT, DEFAULT_WRITE_WAIT};
use portico_core::{ClientOptions, ServerConfig};

fn default_service_id() -> String {
    "gateway01".into()
}

fn default_service_name() -> String {
    "chat".into()
}

fn default_login_wait_secs() -> u64 {
    DEFAULT_LOGIN_WAIT.as_secs()
}

fn default_read_wait_secs() -> u64 {
    DEFAULT_READ_WAIT.as_secs()
}

fn default_write_wait_secs() -> u64 {
    DEFAULT_WRITE_WAIT.as_secs()
}

fn default_heartbeat_secs() -> u64 {
    DEFAULT_HEARTBEAT.as_secs()
}

fn default_count() -> usize {
    5
}

fn default_shutdown_secs() -> u64 {
    10
}

/// Settings shared by `mock_srv` and `mock_cli`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_service_id")]
    pub service_id: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_login_wait_secs")]
    pub login_wait_secs: u64,
    #[serde(default = "default_read_wait_secs")]
    pub read_wait_secs: u64,
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,
    /// Client keep-alive period; 0 disables it.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Number of `hello` messages the client sends.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Time the server waits for channels to drain on shutdown.
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            service_id: default_service_id(),
            service_name: default_service_name(),
            login_wait_secs: default_login_wait_secs(),
            read_wait_secs: default_read_wait_secs(),
            write_wait_secs: default_write_wait_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            count: default_count(),
            shutdown_secs: default_shutdown_secs(),
        }
    }
}

impl MockConfig {
    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn server_config(&self, listen: &str) -> ServerConfig {
        ServerConfig {
            listen: listen.to_string(),
            login_wait: Duration::from_secs(self.login_wait_secs),
            read_wait: Duration::from_secs(self.read_wait_secs),
            write_wait: Duration::from_secs(self.write_wait_secs),
            ..Default::default()
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            heartbeat: Duration::from_secs(self.heartbeat_secs),
            read_wait: Duration::from_secs(self.read_wait_secs),
            write_wait: Duration::from_secs(self.write_wait_secs),
            login_wait: Duration::from_secs(self.login_wait_secs),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}
