//! Frame definition
//!
//! One decoded array-of-bulk-strings unit.

use bytes::Bytes;

use super::codec;

/// An ordered sequence of bulk strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    elements: Vec<Bytes>,
}

impl Frame {
    /// Create a frame from its bulk strings
    pub fn new(elements: Vec<Bytes>) -> Self {
        Self { elements }
    }

    /// Build a frame from text parts
    pub fn from_strings<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let elements = parts
            .into_iter()
            .map(|part| Bytes::copy_from_slice(part.as_ref().as_bytes()))
            .collect();
        Self { elements }
    }

    pub fn elements(&self) -> &[Bytes] {
        &self.elements
    }

    /// Number of bulk strings
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Bytes {
        codec::encode(&self.elements)
    }
}
