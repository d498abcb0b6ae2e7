//! Index Module
//!
//! In-memory pointers from each live key to its newest record on disk.
//!
//! ## Data Structure Choice
//! A skip list (`crossbeam_skiplist::SkipMap`) per data type:
//! - Ordered keys for prefix/range scans
//! - O(log n) put/get/remove
//!
//! Values are cached in the indexer only in `IndexMode::KeyValueMem`.

mod skiplist;

use bytes::Bytes;

use crate::config::IndexMode;
use crate::storage::{DataType, Entry};

pub use skiplist::SkipIndex;

/// Key (and optionally value) metadata held by an indexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub key: Bytes,
    /// Present only in key+value memory mode
    pub value: Option<Bytes>,
    pub value_size: u32,
}

/// Location of a key's newest record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexer {
    pub meta: IndexMeta,
    pub file_id: u32,
    pub offset: u64,
    pub entry_size: u32,
}

impl Indexer {
    /// Describe `entry`, written to segment `file_id` at `offset`
    pub fn new(entry: &Entry, file_id: u32, offset: u64, mode: IndexMode) -> Self {
        let value = match mode {
            IndexMode::KeyValueMem => Some(entry.value.clone()),
            IndexMode::KeyOnlyMem => None,
        };

        Self {
            meta: IndexMeta {
                key: entry.key.clone(),
                value,
                value_size: entry.value.len() as u32,
            },
            file_id,
            offset,
            entry_size: entry.size() as u32,
        }
    }
}

/// Per-type index payload
///
/// Only the string variant has command semantics; the other types keep a
/// generic last-record-wins map until their commands exist.
pub enum TypeIndex {
    Str(SkipIndex),
    List(SkipIndex),
    Hash(SkipIndex),
    Set(SkipIndex),
    ZSet(SkipIndex),
}

impl TypeIndex {
    pub fn new(data_type: DataType) -> Self {
        match data_type {
            DataType::String => TypeIndex::Str(SkipIndex::new()),
            DataType::List => TypeIndex::List(SkipIndex::new()),
            DataType::Hash => TypeIndex::Hash(SkipIndex::new()),
            DataType::Set => TypeIndex::Set(SkipIndex::new()),
            DataType::ZSet => TypeIndex::ZSet(SkipIndex::new()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            TypeIndex::Str(_) => DataType::String,
            TypeIndex::List(_) => DataType::List,
            TypeIndex::Hash(_) => DataType::Hash,
            TypeIndex::Set(_) => DataType::Set,
            TypeIndex::ZSet(_) => DataType::ZSet,
        }
    }

    /// The key-level map behind any variant
    pub fn keys(&self) -> &SkipIndex {
        match self {
            TypeIndex::Str(idx)
            | TypeIndex::List(idx)
            | TypeIndex::Hash(idx)
            | TypeIndex::Set(idx)
            | TypeIndex::ZSet(idx) => idx,
        }
    }
}
