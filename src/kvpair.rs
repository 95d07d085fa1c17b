//! Key-value pairs written into an object's map.

use serde::{Deserialize, Serialize};

/// Number of decimal digits in a key.
///
/// Keys are the pair's index, zero-padded to this width, so that they
/// sort in index order.
pub const KEY_WIDTH: usize = 8;

/// Format a pair index as a fixed-width key.
///
/// An index that doesn't fit in [`KEY_WIDTH`] digits is an error
/// rather than a silently longer key.
pub fn format_key(index: u64) -> Result<String, KeyError> {
    let key = format!("{:0width$}", index, width = KEY_WIDTH);
    if key.len() > KEY_WIDTH {
        return Err(KeyError::TooWide(index, KEY_WIDTH));
    }
    Ok(key)
}

/// One entry in an object's map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    key: String,
    value: Vec<u8>,
}

impl KeyValuePair {
    /// Create a new pair.
    pub fn new(key: String, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// The key of the pair.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value of the pair, as bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Length of the value in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Is the value empty?
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The value as text, for diagnostic output.
    pub fn value_text(&self) -> String {
        String::from_utf8_lossy(&self.value).to_string()
    }
}

/// A group of pairs submitted together as one atomic map write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pairs: Vec<KeyValuePair>,
}

impl Batch {
    /// Create a batch from pairs, keeping their order.
    pub fn new(pairs: Vec<KeyValuePair>) -> Self {
        Self { pairs }
    }

    /// Number of pairs in the batch.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Is the batch empty?
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Total number of value bytes in the batch.
    pub fn value_bytes(&self) -> u64 {
        self.pairs.iter().map(|pair| pair.len() as u64).sum()
    }

    /// Iterate over the pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValuePair> {
        self.pairs.iter()
    }

    /// The pairs as a slice.
    pub fn pairs(&self) -> &[KeyValuePair] {
        &self.pairs
    }
}

/// Possible errors from building keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The index has more digits than a key can hold.
    #[error("pair index {0} does not fit in a {1}-digit key")]
    TooWide(u64, usize),
}
