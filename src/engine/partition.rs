//! Partition
//!
//! Everything owned by one data type: its segment store, index, expiration
//! map and per-file reclaimable space. The engine wraps each partition in its
//! own `RwLock`, so types never contend with each other.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::debug;

use crate::config::IndexMode;
use crate::error::{Result, RoseError};
use crate::expire::Expires;
use crate::index::{Indexer, SkipIndex, TypeIndex};
use crate::storage::{DataType, Entry, SegmentStore, StrMark};

pub struct Partition {
    pub(crate) store: SegmentStore,
    pub(crate) index: TypeIndex,
    pub(crate) expires: Expires,
    /// segment file id → bytes of superseded/removed records
    pub(crate) reclaimable: BTreeMap<u32, i64>,
    pub(crate) idx_mode: IndexMode,
}

impl Partition {
    pub fn new(store: SegmentStore, idx_mode: IndexMode) -> Self {
        let index = TypeIndex::new(store.data_type());
        Self {
            store,
            index,
            expires: Expires::new(),
            reclaimable: BTreeMap::new(),
            idx_mode,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.index.data_type()
    }

    pub fn keys(&self) -> &SkipIndex {
        self.index.keys()
    }

    /// Mark used for tombstones of this type, where one is defined
    pub fn remove_mark(&self) -> Option<u8> {
        match self.index {
            TypeIndex::Str(_) => Some(StrMark::Remove as u8),
            TypeIndex::List(_) | TypeIndex::Hash(_) | TypeIndex::Set(_) | TypeIndex::ZSet(_) => None,
        }
    }

    /// Add a superseded record's size to its file's reclaimable total
    pub fn credit(&mut self, old: &Indexer) {
        credit_space(&mut self.reclaimable, old);
    }

    pub fn total_reclaimable(&self) -> i64 {
        self.reclaimable.values().sum()
    }

    /// Append `entry` and point the index at it, crediting whatever it replaces.
    /// Nothing in memory changes if the append fails.
    pub fn write_and_index(&mut self, entry: &Entry) -> Result<Indexer> {
        let (file_id, offset) = self.store.append(entry)?;
        let indexer = Indexer::new(entry, file_id, offset, self.idx_mode);

        let superseded = self.keys().put(entry.key.clone(), indexer.clone());
        if let Some(old) = superseded {
            self.credit(&old);
        }
        Ok(indexer)
    }

    /// Append a tombstone for `key` and drop it from the index and expiration map
    ///
    /// Returns whether the key was indexed.
    pub fn remove_key(&mut self, key: &Bytes) -> Result<bool> {
        let Some(mark) = self.remove_mark() else {
            return Ok(false);
        };

        let tombstone = Entry::no_extra(key.clone(), Bytes::new(), self.data_type(), mark);
        self.store.append(&tombstone)?;

        let removed = self.keys().remove(key);
        if let Some(old) = &removed {
            self.credit(old);
        }
        self.expires.clear(key);
        Ok(removed.is_some())
    }

    /// Lazily evict `key` if it is past its deadline
    ///
    /// Returns `true` when the key was expired (and is now gone).
    pub fn check_expires(&mut self, key: &Bytes, now: u64) -> Result<bool> {
        if !self.expires.is_expired(key, now) {
            return Ok(false);
        }

        debug!(data_type = ?self.data_type(), key = ?key, "evicting expired key");
        self.remove_key(key)?;
        Ok(true)
    }

    /// Value for an indexer: from memory, or one positional read
    pub fn value_of(&self, indexer: &Indexer) -> Result<Bytes> {
        if let Some(value) = &indexer.meta.value {
            return Ok(value.clone());
        }

        let entry = self.store.read_at(indexer.file_id, indexer.offset)?;
        if entry.key != indexer.meta.key {
            return Err(RoseError::InvalidEntry);
        }
        Ok(entry.value)
    }
}

/// Add a superseded indexer's record size to its file's reclaimable total
pub(crate) fn credit_space(reclaimable: &mut BTreeMap<u32, i64>, old: &Indexer) {
    *reclaimable.entry(old.file_id).or_insert(0) += old.entry_size as i64;
}
