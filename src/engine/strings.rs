//! String commands on `RoseDb`
//!
//! Every write takes the string partition's write lock and first evicts the
//! key if it is past its deadline, so the write sees the same state a read
//! would.

use bytes::Bytes;

use crate::config::IndexMode;
use crate::error::{Result, RoseError};
use crate::index::Indexer;
use crate::storage::{now_secs, DataType, Entry, StrMark};

use super::partition::Partition;
use super::RoseDb;

impl RoseDb {
    // =========================================================================
    // Set / Get
    // =========================================================================

    /// Set a string value, clearing any deadline on the key
    ///
    /// In `KeyValueMem` mode, writing the value a key already holds appends
    /// nothing and leaves its deadline in place.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key_value(key, value)?;
        let key = Bytes::copy_from_slice(key);

        let mut part = self.partition(DataType::String).write();
        part.check_expires(&key, now_secs())?;
        set_locked(&mut part, key, Bytes::copy_from_slice(value))
    }

    /// Get a string value
    ///
    /// Fails with `KeyNotExist` for unknown keys and `KeyExpired` (evicting
    /// the key) once its deadline has passed.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;
        self.with_live(key, |part, indexer| Ok(part.value_of(indexer)?.to_vec()))
    }

    /// Set only if the key is absent; returns whether the value was written
    pub fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        self.check_key_value(key, value)?;
        let key = Bytes::copy_from_slice(key);

        let mut part = self.partition(DataType::String).write();
        part.check_expires(&key, now_secs())?;
        if part.keys().contains(&key) {
            return Ok(false);
        }
        set_locked(&mut part, key, Bytes::copy_from_slice(value))?;
        Ok(true)
    }

    /// Set a new value and return the previous one
    pub fn get_set(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_key_value(key, value)?;
        let key = Bytes::copy_from_slice(key);

        let mut part = self.partition(DataType::String).write();
        part.check_expires(&key, now_secs())?;

        let old = match part.keys().get(&key) {
            Some(indexer) => Some(part.value_of(&indexer)?.to_vec()),
            None => None,
        };
        set_locked(&mut part, key, Bytes::copy_from_slice(value))?;
        Ok(old)
    }

    /// Length of the value in bytes
    pub fn str_len(&self, key: &[u8]) -> Result<usize> {
        self.check_key(key)?;
        self.with_live(key, |_, indexer| Ok(indexer.meta.value_size as usize))
    }

    /// Whether the key holds a live value
    pub fn str_exists(&self, key: &[u8]) -> Result<bool> {
        self.check_key(key)?;
        match self.with_live(key, |_, _| Ok(())) {
            Ok(()) => Ok(true),
            Err(RoseError::KeyNotExist | RoseError::KeyExpired) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove a key; removing an absent key writes nothing
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let key = Bytes::copy_from_slice(key);

        let mut part = self.partition(DataType::String).write();
        if part.check_expires(&key, now_secs())? || !part.keys().contains(&key) {
            return Ok(());
        }
        part.remove_key(&key)?;
        Ok(())
    }

    // =========================================================================
    // Expiration
    // =========================================================================

    /// Expire the key `seconds` from now
    pub fn expire(&self, key: &[u8], seconds: u64) -> Result<()> {
        if seconds == 0 {
            return Err(RoseError::InvalidTtl);
        }
        self.expire_at(key, now_secs().saturating_add(seconds))
    }

    /// Expire the key at an absolute unix time (seconds)
    pub fn expire_at(&self, key: &[u8], deadline: u64) -> Result<()> {
        self.check_key(key)?;
        let key = Bytes::copy_from_slice(key);

        let mut part = self.partition(DataType::String).write();
        if part.check_expires(&key, now_secs())? {
            return Err(RoseError::KeyExpired);
        }
        if !part.keys().contains(&key) {
            return Err(RoseError::KeyNotExist);
        }

        let record = Entry::no_extra(key.clone(), Bytes::new(), DataType::String, StrMark::Expire as u8)
            .with_timestamp(deadline);
        part.store.append(&record)?;
        part.expires.set(key, deadline);
        Ok(())
    }

    /// Drop the key's deadline, if it has one
    pub fn persist(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let key = Bytes::copy_from_slice(key);

        let mut part = self.partition(DataType::String).write();
        if part.check_expires(&key, now_secs())? {
            return Err(RoseError::KeyExpired);
        }
        if !part.keys().contains(&key) {
            return Err(RoseError::KeyNotExist);
        }
        if part.expires.deadline(&key).is_none() {
            return Ok(());
        }

        let record = Entry::no_extra(key.clone(), Bytes::new(), DataType::String, StrMark::Persist as u8);
        part.store.append(&record)?;
        part.expires.clear(&key);
        Ok(())
    }

    /// Seconds until the key expires; `None` when it has no deadline
    pub fn ttl(&self, key: &[u8]) -> Result<Option<u64>> {
        self.check_key(key)?;
        let now = now_secs();
        self.with_live(key, |part, _| {
            Ok(part.expires.deadline(key).map(|deadline| deadline.saturating_sub(now)))
        })
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Live key/value pairs whose key starts with `prefix`, in key order
    ///
    /// Skips the first `offset` matches and returns at most `limit`.
    pub fn prefix_scan(
        &self,
        prefix: &[u8],
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let now = now_secs();
        let part = self.partition(DataType::String).read();

        part.keys()
            .prefix(prefix)
            .filter(|(key, _)| !part.expires.is_expired(key, now))
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(key, indexer)| Ok((key.to_vec(), part.value_of(&indexer)?.to_vec())))
            .collect()
    }

    /// Live key/value pairs with `start <= key <= end`, in key order
    ///
    /// An empty `end` scans to the last key.
    pub fn range_scan(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let now = now_secs();
        let part = self.partition(DataType::String).read();

        part.keys()
            .range(start, end)
            .filter(|(key, _)| !part.expires.is_expired(key, now))
            .map(|(key, indexer)| Ok((key.to_vec(), part.value_of(&indexer)?.to_vec())))
            .collect()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Run `f` against the key's indexer if the key is live
    ///
    /// The common path holds only the read lock. An expired key is evicted
    /// under the write lock; if another writer replaced it in between, the
    /// fresh value is used instead.
    fn with_live<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&Partition, &Indexer) -> Result<T>,
    ) -> Result<T> {
        let lock = self.partition(DataType::String);
        let now = now_secs();

        {
            let part = lock.read();
            let indexer = part.keys().get(key).ok_or(RoseError::KeyNotExist)?;
            if !part.expires.is_expired(key, now) {
                return f(&part, &indexer);
            }
        }

        let key = Bytes::copy_from_slice(key);
        let mut part = lock.write();
        if part.check_expires(&key, now)? {
            return Err(RoseError::KeyExpired);
        }
        let indexer = part.keys().get(&key).ok_or(RoseError::KeyNotExist)?;
        f(&part, &indexer)
    }
}

/// Write a Set record unless `KeyValueMem` already holds the same value
fn set_locked(part: &mut Partition, key: Bytes, value: Bytes) -> Result<()> {
    if part.idx_mode == IndexMode::KeyValueMem {
        let unchanged = part
            .keys()
            .get(&key)
            .is_some_and(|idx| idx.meta.value.as_ref() == Some(&value));
        if unchanged {
            return Ok(());
        }
    }

    let entry = Entry::no_extra(key.clone(), value, DataType::String, StrMark::Set as u8);
    part.write_and_index(&entry)?;
    part.expires.clear(&key);
    Ok(())
}
