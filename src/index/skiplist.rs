//! Ordered key → indexer map
//!
//! Backed by `crossbeam_skiplist::SkipMap`: O(log n) point operations and
//! ordered iteration. Writers are already serialized by the owning
//! partition's lock, so read-then-insert sequences here are not racy.

use std::ops::Bound;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use super::Indexer;

#[derive(Default)]
pub struct SkipIndex {
    map: SkipMap<Bytes, Indexer>,
}

impl SkipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite, returning the superseded indexer
    pub fn put(&self, key: Bytes, indexer: Indexer) -> Option<Indexer> {
        let old = self.get(&key);
        self.map.insert(key, indexer);
        old
    }

    pub fn get(&self, key: &[u8]) -> Option<Indexer> {
        self.map.get(key).map(|e| e.value().clone())
    }

    /// Remove a key, returning its indexer
    pub fn remove(&self, key: &[u8]) -> Option<Indexer> {
        self.map.remove(key).map(|e| e.value().clone())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (Bytes, Indexer)> + '_ {
        self.map.iter().map(|e| (e.key().clone(), e.value().clone()))
    }

    /// Entries with `start <= key <= end` (an empty `end` means unbounded)
    pub fn range<'a>(&'a self, start: &'a [u8], end: &'a [u8]) -> impl Iterator<Item = (Bytes, Indexer)> + 'a {
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(end)
        };

        self.map
            .range::<[u8], _>((Bound::Included(start), upper))
            .map(|e| (e.key().clone(), e.value().clone()))
    }

    /// Entries whose key starts with `prefix`
    pub fn prefix<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (Bytes, Indexer)> + 'a {
        self.map
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}
