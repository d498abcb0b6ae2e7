//! Configuration for rosedb
//!
//! Centralized configuration with sensible defaults. A copy of the active
//! configuration is written to `DB.CFG` on close so a database directory can
//! be reopened without restating it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoseError};
use crate::storage::ENTRY_HEADER_SIZE;

/// File name of the persisted configuration inside the database directory
pub const CONFIG_FILE_NAME: &str = "DB.CFG";

/// Main configuration for a rosedb instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding every segment file plus DB.META / DB.CFG
    pub dir_path: PathBuf,

    /// Maximum size of a single segment file (in bytes)
    pub block_size: u64,

    /// How segment files are read and written
    pub rw_method: FileRwMethod,

    /// Whether values are cached in the in-memory index
    pub idx_mode: IndexMode,

    // -------------------------------------------------------------------------
    // Limits
    // -------------------------------------------------------------------------
    /// Max key length (in bytes)
    pub max_key_size: u32,

    /// Max value length (in bytes)
    pub max_value_size: u32,

    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------
    /// fsync the active segment after every append
    pub sync: bool,

    // -------------------------------------------------------------------------
    // Reclaim Configuration
    // -------------------------------------------------------------------------
    /// Total reclaimable bytes that must be exceeded before a full reclaim runs
    pub reclaim_threshold: i64,

    /// Reclaimable bytes in one archived file that make it eligible for single reclaim
    pub single_reclaim_threshold: i64,
}

/// Segment file access method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileRwMethod {
    /// Positional reads/writes through the standard file API
    FileIo,

    /// Memory-mapped file pre-sized to the block size
    MMap,
}

/// In-memory index mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMode {
    /// Keys and values both live in memory; reads never touch disk
    KeyValueMem,

    /// Only keys live in memory; every read seeks into the owning segment
    KeyOnlyMem,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir_path: std::env::temp_dir().join("rosedb"),
            block_size: 16 * 1024 * 1024, // 16 MB
            rw_method: FileRwMethod::FileIo,
            idx_mode: IndexMode::KeyValueMem,
            max_key_size: 128,
            max_value_size: 1024 * 1024, // 1 MB
            sync: false,
            reclaim_threshold: 64 * 1024 * 1024,
            single_reclaim_threshold: 4 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the limits are usable together
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(RoseError::Config("block_size must be greater than 0".into()));
        }

        let largest = ENTRY_HEADER_SIZE as u64 + self.max_key_size as u64 + self.max_value_size as u64;
        if largest > self.block_size {
            return Err(RoseError::Config(format!(
                "block_size {} cannot hold a record of {} bytes (max key {} + max value {})",
                self.block_size, largest, self.max_key_size, self.max_value_size
            )));
        }

        Ok(())
    }

    /// Load a configuration previously written to `dir/DB.CFG`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Err(RoseError::CfgNotExist);
        }

        let bytes = fs::read(&path)?;
        let mut config: Config = serde_json::from_slice(&bytes)?;
        // The directory may have moved since the file was written.
        config.dir_path = dir.to_path_buf();
        Ok(config)
    }

    /// Persist this configuration to `dir_path/DB.CFG`
    pub fn save(&self) -> Result<()> {
        let path = self.dir_path.join(CONFIG_FILE_NAME);
        let tmp = path.with_extension("CFG.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database directory
    pub fn dir_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dir_path = path.into();
        self
    }

    /// Set the segment file size (in bytes)
    pub fn block_size(mut self, size: u64) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the segment access method
    pub fn rw_method(mut self, method: FileRwMethod) -> Self {
        self.config.rw_method = method;
        self
    }

    /// Set the index mode
    pub fn idx_mode(mut self, mode: IndexMode) -> Self {
        self.config.idx_mode = mode;
        self
    }

    /// Set the max key size (in bytes)
    pub fn max_key_size(mut self, size: u32) -> Self {
        self.config.max_key_size = size;
        self
    }

    /// Set the max value size (in bytes)
    pub fn max_value_size(mut self, size: u32) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Sync the active segment after every write
    pub fn sync(mut self, sync: bool) -> Self {
        self.config.sync = sync;
        self
    }

    /// Set the full reclaim threshold (total reclaimable bytes)
    pub fn reclaim_threshold(mut self, bytes: i64) -> Self {
        self.config.reclaim_threshold = bytes;
        self
    }

    /// Set the single-file reclaim threshold (reclaimable bytes in one file)
    pub fn single_reclaim_threshold(mut self, bytes: i64) -> Self {
        self.config.single_reclaim_threshold = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
