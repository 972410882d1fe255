//! Client
//!
//! Fire-and-forget helper: one connection per command, no reply awaited.

use std::net::TcpStream;

use crate::error::Result;
use crate::protocol::{write_frame, Command};

/// Sends commands to a respkv server
#[derive(Debug, Clone)]
pub struct Client {
    address: String,
}

impl Client {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send `SET key val`
    pub fn set(&self, key: &str, val: &str) -> Result<()> {
        self.send(&Command::Set {
            key: key.to_string(),
            val: val.to_string(),
        })
    }

    /// Connect, write one encoded command and close
    pub fn send(&self, command: &Command) -> Result<()> {
        let mut stream = TcpStream::connect(&self.address)?;
        write_frame(&mut stream, &command.to_frame())?;
        tracing::trace!("Sent {} to {}", command.name(), self.address);
        Ok(())
    }
}
