//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌────────────┬──────────────┬───────┬──────┬─────┐
//! │ *<n>\r\n   │ $<len>\r\n   │ bytes │ \r\n │ ... │
//! └────────────┴──────────────┴───────┴──────┴─────┘
//! ```
//!
//! Lengths are non-negative decimal integers. Anything else, including a
//! truncated body or a missing terminator, is a `MalformedFrame` error.

use std::io::{BufRead, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{KvError, Result};
use super::Frame;

/// Longest accepted header line: marker + digits + CRLF
pub const MAX_HEADER_LEN: usize = 32;

/// Maximum bulk string size (16 MB)
pub const MAX_BULK_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of bulk strings in one frame
pub const MAX_FRAME_ELEMENTS: usize = 1024;

const CRLF: &[u8] = b"\r\n";
const ARRAY_MARKER: u8 = b'*';
const BULK_MARKER: u8 = b'$';

// =============================================================================
// Encoding
// =============================================================================

/// Encode a sequence of strings as one frame
///
/// Format: `*<n>\r\n` then `$<len>\r\n<bytes>\r\n` per element
pub fn encode<T: AsRef<[u8]>>(elements: &[T]) -> Bytes {
    let body_len: usize = elements.iter().map(|e| e.as_ref().len() + 16).sum();
    let mut buf = BytesMut::with_capacity(16 + body_len);

    put_header(&mut buf, ARRAY_MARKER, elements.len());
    for element in elements {
        let element = element.as_ref();
        put_header(&mut buf, BULK_MARKER, element.len());
        buf.put_slice(element);
        buf.put_slice(CRLF);
    }

    buf.freeze()
}

fn put_header(buf: &mut BytesMut, marker: u8, n: usize) {
    buf.put_u8(marker);
    buf.put_slice(n.to_string().as_bytes());
    buf.put_slice(CRLF);
}

/// Write a frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    writer.write_all(&frame.encode())?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Slice Decoding
// =============================================================================

/// Decode a buffer holding exactly one frame
///
/// Trailing bytes after the frame are rejected.
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    let (frame, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(KvError::malformed(format!(
            "{} trailing bytes after frame",
            bytes.len() - consumed
        )));
    }
    Ok(frame)
}

/// Decode the frame at the start of `bytes`
///
/// Returns the frame and the number of bytes consumed
pub fn decode_prefix(bytes: &[u8]) -> Result<(Frame, usize)> {
    let mut cursor = SliceCursor { bytes, pos: 0 };

    let count = parse_header(cursor.line()?, ARRAY_MARKER)?;
    check_element_count(count)?;

    let mut elements = Vec::with_capacity(count);
    for index in 0..count {
        let len = parse_header(cursor.line()?, BULK_MARKER)?;
        check_bulk_len(len)?;

        let body = cursor.take(len).ok_or_else(|| {
            KvError::malformed(format!(
                "element {} declares {} bytes, only {} available",
                index,
                len,
                cursor.remaining()
            ))
        })?;

        match cursor.take(CRLF.len()) {
            Some(terminator) if terminator == CRLF => {}
            Some(_) => return Err(missing_terminator(index)),
            None => return Err(unexpected_end()),
        }

        elements.push(Bytes::copy_from_slice(body));
    }

    Ok((Frame::new(elements), cursor.pos))
}

/// Read position over a borrowed buffer
struct SliceCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceCursor<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Next header line including its `\n`
    fn line(&mut self) -> Result<&'a [u8]> {
        let rest = &self.bytes[self.pos..];
        let window = &rest[..rest.len().min(MAX_HEADER_LEN)];

        match window.iter().position(|&b| b == b'\n') {
            Some(newline) => {
                self.pos += newline + 1;
                Ok(&rest[..=newline])
            }
            None if rest.len() < MAX_HEADER_LEN => Err(unexpected_end()),
            None => Err(header_too_long()),
        }
    }

    /// Take exactly `n` bytes, or nothing
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }
}

// =============================================================================
// Stream Decoding
// =============================================================================

/// Read one complete frame from a stream
///
/// Blocks until a full frame is received. Returns the raw bytes of the
/// frame, validated but not decoded, or `None` if the stream ended cleanly
/// before the first byte.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut raw = Vec::new();

    if read_header_line(reader, &mut raw)? == 0 {
        return Ok(None);
    }
    let count = parse_header(&raw, ARRAY_MARKER)?;
    check_element_count(count)?;

    for index in 0..count {
        let line_start = raw.len();
        if read_header_line(reader, &mut raw)? == 0 {
            return Err(unexpected_end());
        }
        let len = parse_header(&raw[line_start..], BULK_MARKER)?;
        check_bulk_len(len)?;

        // Grow only as body bytes arrive, never by the declared length up front
        let body_start = raw.len();
        let wanted = len + CRLF.len();
        let read = reader.by_ref().take(wanted as u64).read_to_end(&mut raw)?;
        if read < wanted {
            return Err(unexpected_end());
        }

        if &raw[body_start + len..] != CRLF {
            return Err(missing_terminator(index));
        }
    }

    Ok(Some(raw))
}

/// Append one header line (up to and including `\n`) to `buf`
///
/// Returns the number of bytes read, 0 at end of stream.
fn read_header_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize> {
    let read = reader
        .by_ref()
        .take(MAX_HEADER_LEN as u64)
        .read_until(b'\n', buf)?;

    if read > 0 && buf.last() != Some(&b'\n') {
        return Err(if read == MAX_HEADER_LEN {
            header_too_long()
        } else {
            unexpected_end()
        });
    }
    Ok(read)
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Parse a `<marker><digits>\r\n` line into its length
fn parse_header(line: &[u8], marker: u8) -> Result<usize> {
    let (&found, rest) = line.split_first().ok_or_else(unexpected_end)?;
    if found != marker {
        return Err(KvError::malformed(format!(
            "expected '{}', found '{}'",
            marker as char,
            found.escape_ascii()
        )));
    }

    let digits = rest
        .strip_suffix(CRLF)
        .ok_or_else(|| KvError::malformed("length not terminated by CRLF"))?;
    parse_length(digits)
}

/// Parse a non-negative decimal length
fn parse_length(digits: &[u8]) -> Result<usize> {
    let invalid = || {
        KvError::malformed(format!(
            "invalid length '{}'",
            digits.escape_ascii()
        ))
    };

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(invalid)
}

fn check_element_count(count: usize) -> Result<()> {
    if count > MAX_FRAME_ELEMENTS {
        return Err(KvError::malformed(format!(
            "frame declares {} elements (max {})",
            count, MAX_FRAME_ELEMENTS
        )));
    }
    Ok(())
}

fn check_bulk_len(len: usize) -> Result<()> {
    if len > MAX_BULK_LEN {
        return Err(KvError::malformed(format!(
            "bulk string too large: {} bytes (max {})",
            len, MAX_BULK_LEN
        )));
    }
    Ok(())
}

fn unexpected_end() -> KvError {
    KvError::malformed("unexpected end of input")
}

fn header_too_long() -> KvError {
    KvError::malformed(format!("header line longer than {} bytes", MAX_HEADER_LEN))
}

fn missing_terminator(index: usize) -> KvError {
    KvError::malformed(format!("element {} missing CRLF terminator", index))
}
