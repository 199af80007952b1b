//! Client configuration.
//!
//! Loaded from `stowage.toml` with `STOWAGE_`-prefixed environment variables
//! layered on top (e.g. `STOWAGE_REFRESH_TOKEN`, `STOWAGE_API_URL`).

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the storage API (e.g., "https://api.example.com/v1").
    pub api_url: String,
    /// Token endpoint URL for exchanging the refresh token.
    pub identity_url: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Identity of an unattended caller (e.g., a scheduled job).
    /// Takes precedence over `user_id` when both are set.
    #[serde(default)]
    pub system_id: Option<String>,
    /// Identity of the interactive user performing operations.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Display name accompanying `user_id`.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Memory ceiling in bytes for transfer buffers before spilling to disk.
    #[serde(default = "default_spool_memory_limit")]
    pub spool_memory_limit: usize,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds, applied per body chunk so large transfers
    /// are not cut off mid-stream.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_spool_memory_limit() -> usize {
    stowage_core::DEFAULT_SPOOL_MEMORY_LIMIT
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    20
}

impl Config {
    /// Load configuration from `stowage.toml` and `STOWAGE_*` environment
    /// variables, the latter taking precedence.
    pub fn load() -> Result<Self> {
        Self::load_from("stowage.toml")
    }

    /// Load configuration from a specific TOML file plus the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("STOWAGE_"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(Error::Config("api_url must be set".to_string()));
        }
        if self.identity_url.is_empty() {
            return Err(Error::Config("identity_url must be set".to_string()));
        }
        if self.refresh_token.is_empty() {
            return Err(Error::Config("refresh_token must be set".to_string()));
        }
        if self.spool_memory_limit == 0 {
            return Err(Error::Config(
                "spool_memory_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get the read timeout as a Duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Create a test configuration pointed at a local server.
    ///
    /// **For testing only.** Uses dummy credentials and a system identity.
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            api_url: base_url.to_string(),
            identity_url: format!("{base_url}/token"),
            refresh_token: "test-refresh-token".to_string(),
            system_id: Some("test-job".to_string()),
            user_id: None,
            user_name: None,
            spool_memory_limit: default_spool_memory_limit(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}
