//! Configuration for respkv
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{KvError, Result};

/// Address used when the configured listen address is empty
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3333";

/// Main configuration for a respkv server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address (host:port). Empty means `DEFAULT_LISTEN_ADDR`,
    /// `:port` means all interfaces.
    pub listen_addr: String,

    /// Max concurrent peer connections
    pub max_connections: usize,

    /// Peer read timeout (milliseconds), 0 disables it
    pub read_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Dispatcher Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the peer → dispatcher message channel.
    /// 0 makes every forward a rendezvous with the dispatcher.
    pub message_queue_capacity: usize,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Max number of distinct keys, 0 means unlimited
    pub max_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            message_queue_capacity: 0,
            max_entries: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(KvError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The address the listener should actually bind
    pub fn resolved_listen_addr(&self) -> String {
        resolve_listen_addr(&self.listen_addr)
    }

    /// Read timeout as a `Duration`, `None` when disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    /// Store capacity, `None` when unlimited
    pub fn store_capacity(&self) -> Option<usize> {
        (self.max_entries > 0).then_some(self.max_entries)
    }
}

/// Apply the empty and `:port` shorthands to a listen address
pub fn resolve_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.is_empty() {
        DEFAULT_LISTEN_ADDR.to_string()
    } else if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the message channel capacity
    pub fn message_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.message_queue_capacity = capacity;
        self
    }

    /// Set the maximum number of distinct keys
    pub fn max_entries(mut self, count: usize) -> Self {
        self.config.max_entries = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
