//! Engine Module
//!
//! The `RoseDb` facade that coordinates every component.
//!
//! ## Responsibilities
//! - Recover all data types from disk on open
//! - Route string commands to the string partition (see `strings.rs`)
//! - Persist `DB.META` and `DB.CFG`
//! - Gate and run reclaim

pub(crate) mod partition;
mod strings;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, RoseError};
use crate::index::Indexer;
use crate::reclaim::{self, ReclaimCoordinator, RECLAIM_DIR};
use crate::recovery;
use crate::storage::{DataType, DbMeta, SegmentStore};

use partition::Partition;

/// The main database handle
///
/// ## Concurrency Model: one lock per data type
///
/// - Each data type's store, index, expirations and reclaimable space sit
///   behind their own `RwLock`; types never contend with each other
/// - Writes (set, remove, expire, reclaim) take the write lock
/// - Reads take the read lock; a read that finds an expired key drops it and
///   re-takes the write lock to evict, re-checking after acquiring
/// - Full and single-file reclaim are additionally excluded by two
///   process-wide flags in `ReclaimCoordinator`
pub struct RoseDb {
    /// Engine configuration
    config: Config,

    /// One partition per data type, indexed by `DataType::index()`
    partitions: Vec<RwLock<Partition>>,

    /// Full / single reclaim flags
    reclaim: ReclaimCoordinator,
}

impl RoseDb {
    /// Open or create a database with the given config
    ///
    /// On startup:
    /// 1. Validate the config and create the directory
    /// 2. Discard a half-written reclaim directory
    /// 3. Discover segment files and load `DB.META`
    /// 4. Recover every data type in parallel
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.dir_path)?;

        // Step 2: Output of an interrupted full reclaim was never renamed in
        let tmp_dir = config.dir_path.join(RECLAIM_DIR);
        if tmp_dir.exists() {
            debug!(path = ?tmp_dir, "removing leftover reclaim directory");
            fs::remove_dir_all(&tmp_dir)?;
        }

        // Step 3: Find segment files and persisted metadata
        let ids = SegmentStore::discover(&config.dir_path)?;
        let meta = DbMeta::load(&config.dir_path)?;

        // Step 4: Rebuild indexes, one thread per data type
        let recovered = recovery::recover_all(&config, &ids, &meta)?;

        let mut partitions = Vec::with_capacity(recovered.len());
        for (partition, stats) in recovered {
            info!(
                data_type = ?partition.data_type(),
                files = stats.files_scanned,
                records = stats.records_replayed,
                live_keys = stats.live_keys,
                write_offset = stats.active_write_offset,
                "partition ready"
            );
            partitions.push(RwLock::new(partition));
        }

        let db = Self {
            config,
            partitions,
            reclaim: ReclaimCoordinator::new(),
        };
        db.store_meta()?;

        info!(dir = ?db.config.dir_path, "rosedb opened");
        Ok(db)
    }

    /// Reopen a directory using the config saved there by a previous close
    pub fn reopen(dir: &Path) -> Result<Self> {
        let config = Config::load(dir)?;
        Self::open(config)
    }

    pub(crate) fn partition(&self, data_type: DataType) -> &RwLock<Partition> {
        &self.partitions[data_type.index()]
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Current write offsets and string reclaimable space
    pub fn meta(&self) -> DbMeta {
        let mut meta = DbMeta::default();
        for data_type in DataType::ALL {
            let part = self.partition(data_type).read();
            meta.active_write_off.insert(data_type as u8, part.store.write_offset());
            if data_type == DataType::String {
                meta.reclaimable_space = part.reclaimable.clone();
            }
        }
        meta
    }

    /// Write `DB.META`; must not be called while holding a partition lock
    fn store_meta(&self) -> Result<()> {
        self.meta().store(&self.config.dir_path)
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Sync every active file and persist metadata
    pub fn sync(&self) -> Result<()> {
        for data_type in DataType::ALL {
            self.partition(data_type).read().store.sync()?;
        }
        self.store_meta()
    }

    /// Close the database gracefully
    ///
    /// Syncs every active file, then writes `DB.META` and `DB.CFG`.
    pub fn close(self) -> Result<()> {
        self.store_meta()?;
        self.config.save()?;

        for lock in self.partitions {
            lock.into_inner().store.close(true)?;
        }

        info!(dir = ?self.config.dir_path, "rosedb closed");
        Ok(())
    }

    // =========================================================================
    // Reclaim
    // =========================================================================

    /// Compact every string segment, dropping superseded records
    ///
    /// Fails with `ReclaimUnreached` unless total reclaimable space exceeds
    /// `reclaim_threshold`, and with `DbIsReclaiming` while a single-file
    /// reclaim is running.
    pub fn reclaim(&self) -> Result<()> {
        let _guard = self.reclaim.begin_full()?;

        let stats = {
            let mut part = self.partition(DataType::String).write();
            let total = part.total_reclaimable();
            if total <= self.config.reclaim_threshold {
                return Err(RoseError::ReclaimUnreached);
            }
            reclaim::full_reclaim(&mut part, &self.config)?
        };

        info!(
            files_removed = stats.files_removed,
            files_written = stats.files_written,
            records_moved = stats.records_moved,
            bytes_reclaimed = stats.bytes_reclaimed,
            "full reclaim finished"
        );
        self.store_meta()
    }

    /// Compact each archived string file whose reclaimable space reaches
    /// `single_reclaim_threshold`; returns how many files were reclaimed
    pub fn single_reclaim(&self) -> Result<usize> {
        let _guard = self.reclaim.begin_single()?;

        let reclaimed = {
            let mut part = self.partition(DataType::String).write();
            let candidates =
                reclaim::single_candidates(&part, self.config.single_reclaim_threshold);
            for &file_id in &candidates {
                reclaim::single_reclaim_file(&mut part, file_id)?;
            }
            candidates.len()
        };

        if reclaimed > 0 {
            info!(files = reclaimed, "single reclaim finished");
            self.store_meta()?;
        }
        Ok(reclaimed)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(RoseError::EmptyKey);
        }
        if key.len() > self.config.max_key_size as usize {
            return Err(RoseError::KeyTooLarge);
        }
        Ok(())
    }

    fn check_key_value(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        if value.len() > self.config.max_value_size as usize {
            return Err(RoseError::ValueTooLarge);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and tooling)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Id of the active segment file of `data_type`
    pub fn active_file_id(&self, data_type: DataType) -> u32 {
        self.partition(data_type).read().store.active_id()
    }

    /// Ids of the archived segment files of `data_type`, ascending
    pub fn archived_file_ids(&self, data_type: DataType) -> Vec<u32> {
        self.partition(data_type).read().store.archived_ids()
    }

    /// Write offset of the active segment file of `data_type`
    pub fn active_write_offset(&self, data_type: DataType) -> u64 {
        self.partition(data_type).read().store.write_offset()
    }

    /// Reclaimable bytes per string segment file id
    pub fn reclaimable_space(&self) -> BTreeMap<u32, i64> {
        self.partition(DataType::String).read().reclaimable.clone()
    }

    /// Index entry of a string key, expired or not
    pub fn indexer(&self, key: &[u8]) -> Option<Indexer> {
        self.partition(DataType::String).read().keys().get(key)
    }

    /// Number of indexed keys of `data_type`
    pub fn key_count(&self, data_type: DataType) -> usize {
        self.partition(data_type).read().keys().len()
    }
}
