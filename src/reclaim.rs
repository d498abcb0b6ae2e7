//! Reclaim Coordinator
//!
//! Tracks who is compacting and implements the two compaction modes for the
//! string partition.
//!
//! ## Modes
//! - **Full**: rewrite every live record into fresh segment files whose ids
//!   continue after the current active id, then delete all old files
//! - **Single**: move the live records of one archived file into the active
//!   file, then delete that file
//!
//! Both modes only ever write records with ids higher than those they
//! replace, so replaying the directory after a crash at any step yields the
//! same live keys and values.
//!
//! The two flags are process-wide rather than per data type; a full and a
//! single reclaim never run at the same time anywhere in the engine.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::Config;
use crate::engine::partition::Partition;
use crate::error::{Result, RoseError};
use crate::index::Indexer;
use crate::storage::{segment_file_name, DataType, Entry, SegmentStore, StrMark};

/// Temporary directory (inside the database directory) for full reclaim output
pub const RECLAIM_DIR: &str = "rosedb_reclaim";

// =============================================================================
// Coordinator
// =============================================================================

/// Mutual exclusion between full and single-file reclaim
#[derive(Debug, Default)]
pub struct ReclaimCoordinator {
    reclaiming: AtomicBool,
    single_reclaiming: AtomicBool,
}

/// Clears its flag when dropped
pub struct ReclaimGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ReclaimGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl ReclaimCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the full-reclaim flag
    pub fn begin_full(&self) -> Result<ReclaimGuard<'_>> {
        Self::claim(&self.reclaiming, &self.single_reclaiming)
    }

    /// Claim the single-reclaim flag
    pub fn begin_single(&self) -> Result<ReclaimGuard<'_>> {
        Self::claim(&self.single_reclaiming, &self.reclaiming)
    }

    pub fn is_reclaiming(&self) -> bool {
        self.reclaiming.load(Ordering::SeqCst)
    }

    pub fn is_single_reclaiming(&self) -> bool {
        self.single_reclaiming.load(Ordering::SeqCst)
    }

    fn claim<'a>(mine: &'a AtomicBool, other: &AtomicBool) -> Result<ReclaimGuard<'a>> {
        if other.load(Ordering::SeqCst) {
            return Err(RoseError::DbIsReclaiming);
        }
        if mine
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RoseError::DbIsReclaiming);
        }

        let guard = ReclaimGuard { flag: mine };
        // Both sides may have passed the first check; re-check after claiming.
        if other.load(Ordering::SeqCst) {
            return Err(RoseError::DbIsReclaiming);
        }
        Ok(guard)
    }
}

// =============================================================================
// Full Reclaim
// =============================================================================

/// What a reclaim pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimStats {
    /// Segment files deleted
    pub files_removed: usize,

    /// Segment files created
    pub files_written: usize,

    /// Live records copied forward
    pub records_moved: usize,

    /// Reclaimable bytes released
    pub bytes_reclaimed: i64,
}

/// Rewrite every live record of `part` into fresh segment files
pub fn full_reclaim(part: &mut Partition, config: &Config) -> Result<ReclaimStats> {
    let data_type = part.data_type();
    let dir = part.store.dir().to_path_buf();
    let tmp_dir = dir.join(RECLAIM_DIR);
    if tmp_dir.exists() {
        fs::remove_dir_all(&tmp_dir)?;
    }
    fs::create_dir_all(&tmp_dir)?;

    let first_id = part.store.active_id() + 1;
    let mut fresh = SegmentStore::open(
        &tmp_dir,
        data_type,
        &[first_id],
        config.rw_method,
        config.block_size,
        false,
    )?;

    let mut moved: Vec<(Bytes, Indexer)> = Vec::with_capacity(part.keys().len());
    for (key, indexer) in part.keys().iter() {
        let entry = part.store.read_at(indexer.file_id, indexer.offset)?;
        let (file_id, offset) = fresh.append(&entry)?;
        moved.push((key.clone(), Indexer::new(&entry, file_id, offset, part.idx_mode)));

        if let Some(deadline) = part.expires.deadline(&key) {
            fresh.append(&expire_record(key, data_type, deadline))?;
        }
    }

    let mut new_ids = fresh.archived_ids();
    new_ids.push(fresh.active_id());
    let write_offset = fresh.write_offset();
    fresh.close(true)?;

    // Output ids sort after every live file, so nothing of it may stay
    // behind in `dir` unless the store is switched over to it.
    let mut installed = Vec::with_capacity(new_ids.len());
    let opened = install(&tmp_dir, &dir, data_type, &new_ids, &mut installed).and_then(|()| {
        SegmentStore::open(
            &dir,
            data_type,
            &new_ids,
            config.rw_method,
            config.block_size,
            config.sync,
        )
    });
    let mut store = match opened {
        Ok(store) => store,
        Err(e) => {
            rollback(&installed, &tmp_dir);
            return Err(e);
        }
    };
    store.active_mut().set_offset(write_offset);

    let old = std::mem::replace(&mut part.store, store);
    let records_moved = moved.len();
    for (key, indexer) in moved {
        part.keys().put(key, indexer);
    }
    let bytes_reclaimed = part.total_reclaimable();
    part.reclaimable.clear();

    // Old files left behind from here on only hold superseded records.
    let old_paths: Vec<PathBuf> = old.files().map(|f| f.path().to_path_buf()).collect();
    old.close(true)?;
    for path in &old_paths {
        fs::remove_file(path)?;
    }
    fs::remove_dir_all(&tmp_dir)?;

    Ok(ReclaimStats {
        files_removed: old_paths.len(),
        files_written: new_ids.len(),
        records_moved,
        bytes_reclaimed,
    })
}

/// Move reclaim output from `tmp_dir` into `dir`, recording each moved path
fn install(
    tmp_dir: &Path,
    dir: &Path,
    data_type: DataType,
    ids: &[u32],
    installed: &mut Vec<PathBuf>,
) -> Result<()> {
    for &id in ids {
        let name = segment_file_name(id, data_type);
        let target = dir.join(&name);
        fs::rename(tmp_dir.join(&name), &target)?;
        installed.push(target);
    }
    Ok(())
}

/// Delete reclaim output already moved into the database directory
fn rollback(installed: &[PathBuf], tmp_dir: &Path) {
    for path in installed {
        if let Err(e) = fs::remove_file(path) {
            warn!(?path, error = %e, "failed to remove reclaim output");
        }
    }
    if let Err(e) = fs::remove_dir_all(tmp_dir) {
        warn!(path = ?tmp_dir, error = %e, "failed to remove reclaim directory");
    }
}

// =============================================================================
// Single-File Reclaim
// =============================================================================

/// Archived files whose reclaimable space reaches `threshold`
pub fn single_candidates(part: &Partition, threshold: i64) -> Vec<u32> {
    part.store
        .archived_ids()
        .into_iter()
        .filter(|id| part.reclaimable.get(id).is_some_and(|&space| space >= threshold))
        .collect()
}

/// Move the live records of archived file `file_id` forward and delete it
///
/// Besides live values, state that older files could otherwise resurrect is
/// carried forward: tombstones for keys that are gone, and the current
/// deadline (or its absence) for keys whose expiry records lived here.
pub fn single_reclaim_file(part: &mut Partition, file_id: u32) -> Result<ReclaimStats> {
    let data_type = part.data_type();
    let remove_mark = part.remove_mark().ok_or(RoseError::InvalidEntry)?;
    let is_oldest = part.store.files().next().map(|f| f.id()) == Some(file_id);

    let records: Vec<(u64, Entry)> = match part.store.file(file_id) {
        Some(file) if file_id != part.store.active_id() => file.scan().collect::<Result<_>>()?,
        _ => return Ok(ReclaimStats::default()),
    };

    let mut records_moved = 0;
    let mut moved_keys = BTreeSet::new();
    let mut removed_keys = BTreeSet::new();
    let mut expiry_keys = BTreeSet::new();

    for (offset, entry) in records {
        match StrMark::from_u8(entry.mark) {
            Some(StrMark::Set) => {
                let live = part
                    .keys()
                    .get(&entry.key)
                    .is_some_and(|idx| idx.file_id == file_id && idx.offset == offset);
                if live {
                    part.write_and_index(&entry)?;
                    moved_keys.insert(entry.key.clone());
                    records_moved += 1;
                }
            }
            Some(StrMark::Remove) => {
                if !is_oldest {
                    removed_keys.insert(entry.key.clone());
                }
            }
            Some(StrMark::Expire) | Some(StrMark::Persist) => {
                expiry_keys.insert(entry.key.clone());
            }
            None => return Err(RoseError::InvalidEntry),
        }
    }

    for key in removed_keys {
        if !part.keys().contains(&key) {
            let tombstone = Entry::no_extra(key, Bytes::new(), data_type, remove_mark);
            part.store.append(&tombstone)?;
        }
    }

    for key in moved_keys.union(&expiry_keys) {
        if !part.keys().contains(key) {
            continue;
        }
        match part.expires.deadline(key) {
            Some(deadline) => {
                part.store.append(&expire_record(key.clone(), data_type, deadline))?;
            }
            None if expiry_keys.contains(key) && !is_oldest => {
                let persist = Entry::no_extra(key.clone(), Bytes::new(), data_type, StrMark::Persist as u8);
                part.store.append(&persist)?;
            }
            None => {}
        }
    }

    part.store.remove_archived(file_id)?;
    let bytes_reclaimed = part.reclaimable.remove(&file_id).unwrap_or(0);

    debug!(file_id, records_moved, bytes_reclaimed, "single reclaim finished");

    Ok(ReclaimStats {
        files_removed: 1,
        files_written: 0,
        records_moved,
        bytes_reclaimed,
    })
}

fn expire_record(key: Bytes, data_type: DataType, deadline: u64) -> Entry {
    Entry::no_extra(key, Bytes::new(), data_type, StrMark::Expire as u8).with_timestamp(deadline)
}
