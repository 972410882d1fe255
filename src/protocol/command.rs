//! Command definitions
//!
//! Interprets decoded frames as typed commands. The first bulk string,
//! upper-cased, selects the variant; the rest are positional arguments.

use bytes::Bytes;

use crate::error::{KvError, Result};
use super::{codec, Frame};

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert or overwrite a key
    Set { key: String, val: String },
}

impl Command {
    /// Canonical wire token for this command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
        }
    }

    /// Interpret an already-decoded frame
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let (head, args) = frame
            .elements()
            .split_first()
            .ok_or_else(|| KvError::malformed("empty command frame"))?;

        let token = String::from_utf8_lossy(head);
        match token.to_ascii_uppercase().as_str() {
            "SET" => parse_set(args),
            _ => Err(KvError::UnknownCommand(token.into_owned())),
        }
    }

    /// Build the frame a client sends for this command
    pub fn to_frame(&self) -> Frame {
        match self {
            Command::Set { key, val } => {
                Frame::from_strings([self.name(), key.as_str(), val.as_str()])
            }
        }
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Bytes {
        self.to_frame().encode()
    }
}

/// Decode the wire form and interpret it as a command
pub fn parse_command(raw: &[u8]) -> Result<Command> {
    let frame = codec::decode(raw)?;
    Command::from_frame(&frame)
}

fn parse_set(args: &[Bytes]) -> Result<Command> {
    let [key, val] = args else {
        return Err(wrong_arity("SET", 2, args.len()));
    };

    Ok(Command::Set {
        key: utf8_arg("SET", "key", key)?,
        val: utf8_arg("SET", "value", val)?,
    })
}

fn utf8_arg(command: &str, field: &str, bytes: &Bytes) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        KvError::malformed(format!("{} {} is not valid UTF-8", command, field))
    })
}

fn wrong_arity(command: &str, expected: usize, got: usize) -> KvError {
    KvError::malformed(format!(
        "wrong number of arguments for '{}': expected {}, got {}",
        command, expected, got
    ))
}
