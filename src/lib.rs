//! # respkv
//!
//! A minimal network-accessible key-value store:
//! - Array-of-bulk-strings wire framing
//! - One read loop per connection
//! - A single dispatcher thread that owns every piece of mutable state
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Listener                            │
//! │                  (accept loop thread)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one thread per connection
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Peers                                 │
//! │        read_frame → raw bytes (producers only)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ crossbeam channels
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Dispatcher                               │
//! │     control | peer events | raw messages, one at a time      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ parse_command + apply
//!                ┌──────▼──────┐
//!                │   KvStore   │
//!                │  (no lock)  │
//!                └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use client::Client;
pub use network::Server;
pub use protocol::Command;
pub use store::KvStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
