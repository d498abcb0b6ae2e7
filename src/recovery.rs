//! Recovery / Loader
//!
//! Rebuilds every partition from its segment files on startup.
//!
//! ## Procedure (per data type, one thread each)
//! 1. Open the type's segment files, highest id as the active file
//! 2. Scan each file from offset 0 in ascending id order until end of data
//! 3. Replay each record into the index, expiration map and reclaimable space
//! 4. Resume appending at the end of the active file's last valid record
//!
//! Any decode error other than a clean end of data aborts the open.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::Config;
use crate::engine::partition::{credit_space, Partition};
use crate::error::{Result, RoseError};
use crate::expire::Expires;
use crate::index::{Indexer, SkipIndex, TypeIndex};
use crate::storage::{DataType, DbMeta, Entry, SegmentStore, StrMark};

/// Result of recovering one data type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Segment files scanned
    pub files_scanned: usize,

    /// Records replayed across all files
    pub records_replayed: u64,

    /// Keys live after replay
    pub live_keys: usize,

    /// Where appends resume in the active file
    pub active_write_offset: u64,
}

/// Recover all data types in parallel; partitions come back in `DataType::ALL` order
pub fn recover_all(
    config: &Config,
    ids: &BTreeMap<DataType, Vec<u32>>,
    meta: &DbMeta,
) -> Result<Vec<(Partition, RecoveryStats)>> {
    let no_ids = Vec::new();

    crossbeam::thread::scope(|s| {
        let handles: Vec<_> = DataType::ALL
            .into_iter()
            .map(|data_type| {
                let type_ids = ids.get(&data_type).unwrap_or(&no_ids);
                let persisted = meta.active_write_off.get(&(data_type as u8)).copied();
                s.spawn(move |_| recover_partition(config, data_type, type_ids, persisted))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| RoseError::Recovery("recovery thread panicked".into()))?
            })
            .collect::<Result<Vec<_>>>()
    })
    .map_err(|_| RoseError::Recovery("recovery scope panicked".into()))?
}

/// Open and replay the segment files of a single data type
pub fn recover_partition(
    config: &Config,
    data_type: DataType,
    ids: &[u32],
    persisted_offset: Option<u64>,
) -> Result<(Partition, RecoveryStats)> {
    let store = SegmentStore::open(
        &config.dir_path,
        data_type,
        ids,
        config.rw_method,
        config.block_size,
        config.sync,
    )?;
    let mut partition = Partition::new(store, config.idx_mode);
    let mut stats = RecoveryStats::default();

    let Partition {
        store,
        index,
        expires,
        reclaimable,
        idx_mode,
    } = &mut partition;

    let active_id = store.active_id();
    let mut active_end = 0;

    for file in store.files() {
        let mut scan = file.scan();
        for item in scan.by_ref() {
            let (offset, entry) = item?;
            let indexer = Indexer::new(&entry, file.id(), offset, *idx_mode);
            replay(index, expires, reclaimable, entry, indexer)?;
            stats.records_replayed += 1;
        }

        stats.files_scanned += 1;
        if file.id() == active_id {
            active_end = scan.offset();
        }
    }

    if let Some(persisted) = persisted_offset {
        if persisted != active_end {
            warn!(
                ?data_type,
                persisted,
                scanned = active_end,
                "persisted write offset disagrees with segment contents, using scanned offset"
            );
        }
    }

    store.active_mut().set_offset(active_end);
    stats.active_write_offset = active_end;
    stats.live_keys = index.keys().len();

    debug!(
        ?data_type,
        files = stats.files_scanned,
        records = stats.records_replayed,
        live_keys = stats.live_keys,
        "recovered partition"
    );

    Ok((partition, stats))
}

/// Apply one decoded record to the in-memory state
fn replay(
    index: &TypeIndex,
    expires: &mut Expires,
    reclaimable: &mut BTreeMap<u32, i64>,
    entry: Entry,
    indexer: Indexer,
) -> Result<()> {
    match index {
        TypeIndex::Str(idx) => replay_string(idx, expires, reclaimable, entry, indexer),
        TypeIndex::List(idx) | TypeIndex::Hash(idx) | TypeIndex::Set(idx) | TypeIndex::ZSet(idx) => {
            put_superseding(idx, reclaimable, entry.key, indexer);
            Ok(())
        }
    }
}

fn replay_string(
    idx: &SkipIndex,
    expires: &mut Expires,
    reclaimable: &mut BTreeMap<u32, i64>,
    entry: Entry,
    indexer: Indexer,
) -> Result<()> {
    let mark = StrMark::from_u8(entry.mark).ok_or(RoseError::InvalidEntry)?;

    match mark {
        StrMark::Set => {
            expires.clear(&entry.key);
            put_superseding(idx, reclaimable, entry.key, indexer);
        }
        StrMark::Remove => {
            if let Some(old) = idx.remove(&entry.key) {
                credit_space(reclaimable, &old);
            }
            expires.clear(&entry.key);
        }
        StrMark::Expire => {
            if idx.contains(&entry.key) {
                expires.set(entry.key, entry.timestamp);
            }
        }
        StrMark::Persist => {
            expires.clear(&entry.key);
        }
    }
    Ok(())
}

fn put_superseding(
    idx: &SkipIndex,
    reclaimable: &mut BTreeMap<u32, i64>,
    key: Bytes,
    indexer: Indexer,
) {
    if let Some(old) = idx.put(key, indexer) {
        credit_space(reclaimable, &old);
    }
}

