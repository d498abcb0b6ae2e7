//! Expiration tracking
//!
//! Per data type, a map from key to its deadline in unix seconds. Entries are
//! evicted lazily: the read path asks whether a key is past its deadline and,
//! if so, writes a tombstone and drops the key (see `Partition::check_expires`).

use std::collections::HashMap;

use bytes::Bytes;

#[derive(Debug, Default)]
pub struct Expires {
    deadlines: HashMap<Bytes, u64>,
}

impl Expires {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the deadline for `key`
    pub fn set(&mut self, key: Bytes, deadline: u64) {
        self.deadlines.insert(key, deadline);
    }

    pub fn deadline(&self, key: &[u8]) -> Option<u64> {
        self.deadlines.get(key).copied()
    }

    /// Remove the deadline, returning it if one existed
    pub fn clear(&mut self, key: &[u8]) -> Option<u64> {
        self.deadlines.remove(key)
    }

    /// A key expires once the clock passes its deadline
    pub fn is_expired(&self, key: &[u8], now: u64) -> bool {
        self.deadline(key).is_some_and(|deadline| now > deadline)
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
