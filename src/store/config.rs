//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::lock::{DEFAULT_LOCK_ATTEMPTS, DEFAULT_LOCK_BACKOFF};
use crate::storage::ServerHost;

/// Store configuration options.
///
/// Deserializable so a host application can embed it in its own config
/// file; every field except `root` has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the store root (also the git working tree).
    pub root: PathBuf,
    /// Host used in commit signatures when the caller does not supply one.
    #[serde(default)]
    pub host: ServerHost,
    /// Attempts at a contended path lock before giving up.
    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,
    /// Wait between lock attempts, in milliseconds.
    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,
    /// Committer name for every commit.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_lock_attempts() -> u32 {
    DEFAULT_LOCK_ATTEMPTS
}

fn default_lock_backoff_ms() -> u64 {
    DEFAULT_LOCK_BACKOFF.as_millis() as u64
}

fn default_service_name() -> String {
    "tiddlyweb".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("store"),
            host: ServerHost::default(),
            lock_attempts: default_lock_attempts(),
            lock_backoff_ms: default_lock_backoff_ms(),
            service_name: default_service_name(),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn host(mut self, host: ServerHost) -> Self {
        self.host = host;
        self
    }

    pub fn lock_attempts(mut self, attempts: u32) -> Self {
        self.lock_attempts = attempts;
        self
    }

    pub fn lock_backoff(mut self, backoff: Duration) -> Self {
        self.lock_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }
}
