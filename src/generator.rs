//! Synthesize batches of key-value pairs for benchmarking.
//!
//! Everything here is deterministic: the same inputs always produce
//! the same keys and the same value bytes, so a run can be repeated
//! and its results checked exactly.

use crate::kvpair::{format_key, Batch, KeyError, KeyValuePair};

/// Generate `count` pairs for indexes starting at `starting_index`.
///
/// The key of pair `i` is `i` zero-padded to the key width. Its
/// value is `value_size` ASCII digits, where byte `k` is the digit
/// `(i + k) mod 10`.
pub fn generate(count: usize, starting_index: u64, value_size: usize) -> Result<Batch, KeyError> {
    if count > 0 {
        format_key(starting_index + count as u64 - 1)?;
    }
    let mut pairs = Vec::with_capacity(count);
    for i in 0..count as u64 {
        let index = starting_index + i;
        pairs.push(KeyValuePair::new(format_key(index)?, value(index, value_size)));
    }
    Ok(Batch::new(pairs))
}

fn value(index: u64, value_size: usize) -> Vec<u8> {
    // Reduce first so that large indexes and sizes can't overflow.
    let base = (index % 10) as usize;
    (0..value_size)
        .map(|k| b'0' + ((base + k % 10) % 10) as u8)
        .collect()
}

/// Offsets at which the benchmark loop generates a batch.
///
/// Starting at zero, each offset is `step` past the previous one,
/// while it stays below `goal`. Every offset gets a full batch, so
/// the last batch may reach past `goal`.
#[derive(Debug)]
pub struct BatchOffsets {
    goal: u64,
    step: u64,
    next: u64,
}

impl BatchOffsets {
    /// Create a new iterator over offsets.
    ///
    /// A zero `step` would never advance; the caller must validate it.
    pub fn new(goal: u64, step: u64) -> Self {
        assert!(step > 0);
        Self {
            goal,
            step,
            next: 0,
        }
    }
}

impl Iterator for BatchOffsets {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.goal {
            None
        } else {
            let offset = self.next;
            self.next = self.next.saturating_add(self.step);
            Some(offset)
        }
    }
}
