//! KvStore implementation
//!
//! HashMap-based table, owned by a single thread.

use std::collections::HashMap;

use crate::error::{KvError, Result};
use crate::protocol::Command;

/// String to string mapping mutated only by its owner
#[derive(Debug, Clone, Default)]
pub struct KvStore {
    data: HashMap<String, String>,

    /// Max number of distinct keys, `None` for unlimited
    capacity: Option<usize>,
}

impl KvStore {
    /// Create a new empty store without a key limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store holding at most `capacity` keys
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            data: HashMap::new(),
            capacity,
        }
    }

    /// Apply a parsed command
    ///
    /// New command variants are handled here so callers stay unchanged.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Set { key, val } => self.set(key, val),
        }
    }

    /// Insert or overwrite a key
    ///
    /// Overwrites always succeed; a new key fails once the limit is reached.
    pub fn set(&mut self, key: String, val: String) -> Result<()> {
        if let Some(limit) = self.capacity {
            if self.data.len() >= limit && !self.data.contains_key(&key) {
                return Err(KvError::Store(format!(
                    "capacity exceeded: {} keys (max {})",
                    self.data.len(),
                    limit
                )));
            }
        }

        self.data.insert(key, val);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Iterate over all entries, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of the current contents
    pub fn to_map(&self) -> HashMap<String, String> {
        self.data.clone()
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.data
    }
}
