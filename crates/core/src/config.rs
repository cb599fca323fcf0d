//! Client configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid:
//!
//! ```toml
//! host = "ts.example.org"
//! port = 10011
//! virtual_server_id = 1
//!
//! [login]
//! username = "serveradmin"
//! password = "secret"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default Server Query port
pub const DEFAULT_PORT: u16 = 10011;
/// Default roster poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Default event queue capacity
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 25;
/// Default time to wait for room in the event queue
pub const DEFAULT_EVENT_POST_TIMEOUT_MS: u64 = 5000;
/// Default number of completed responses buffered by the reader
pub const DEFAULT_RESPONSE_QUEUE_CAPACITY: usize = 20;

const CONFIG_FILE: &str = "squery.toml";

/// Query login credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Connection and engine settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub host: String,
    pub port: u16,
    pub poll_interval_ms: u64,
    pub event_queue_capacity: usize,
    pub event_post_timeout_ms: u64,
    pub response_queue_capacity: usize,
    /// Synthesize connect/disconnect/move events by polling the roster
    pub use_polling: bool,
    pub login: Option<Credentials>,
    pub virtual_server_id: Option<u32>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            event_post_timeout_ms: DEFAULT_EVENT_POST_TIMEOUT_MS,
            response_queue_capacity: DEFAULT_RESPONSE_QUEUE_CAPACITY,
            use_polling: true,
            login: None,
            virtual_server_id: None,
        }
    }
}

impl QueryConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Per-user config location, e.g. `~/.config/squery/squery.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "onyx", "squery").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Invalid("host is empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(Error::Invalid("event_queue_capacity must be > 0".into()));
        }
        if self.response_queue_capacity == 0 {
            return Err(Error::Invalid("response_queue_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// `host:port` for connecting
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn event_post_timeout(&self) -> Duration {
        Duration::from_millis(self.event_post_timeout_ms)
    }
}
