//! Error types for respkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for respkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// Bad length prefix, truncated input, missing terminator or wrong arity
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Leading token did not name a known command
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(String),

    // -------------------------------------------------------------------------
    // Dispatcher Errors
    // -------------------------------------------------------------------------
    /// The dispatcher stopped and its channels are gone
    #[error("Dispatcher is closed")]
    DispatcherClosed,

    #[error("Dispatcher failure: {0}")]
    Dispatcher(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Shorthand used throughout the codec
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        KvError::MalformedFrame(message.into())
    }
}
