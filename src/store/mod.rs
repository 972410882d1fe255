//! Store Module
//!
//! In-memory key-value mapping.
//!
//! ## Responsibilities
//! - Insert or overwrite keys
//! - Enforce an optional limit on distinct keys
//! - Apply parsed commands (the dispatcher's single entry point)
//!
//! ## Ownership
//! The store has no interior locking. It is owned by the dispatcher thread
//! and every mutation goes through `&mut self`.

mod table;

pub use table::KvStore;
