//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frame Format (array of bulk strings)
//!
//! ```text
//! *<n>\r\n                 element count
//! $<len>\r\n<bytes>\r\n    repeated n times, len = exact byte length
//! ```
//!
//! ### Example: SET foo bar
//! ```text
//! *3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
//! ```
//!
//! ### Commands
//! - SET key value
//!
//! The server never writes a response frame back.

mod command;
mod frame;
mod codec;

pub use command::{parse_command, Command};
pub use frame::Frame;
pub use codec::{
    decode, decode_prefix, encode, read_frame, write_frame, MAX_BULK_LEN, MAX_FRAME_ELEMENTS,
    MAX_HEADER_LEN,
};
