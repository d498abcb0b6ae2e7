//! Error types for rosedb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RoseError
pub type Result<T> = std::result::Result<T, RoseError>;

/// Unified error type for rosedb operations
#[derive(Debug, Error)]
pub enum RoseError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("the key is empty")]
    EmptyKey,

    #[error("key exceeded the max length")]
    KeyTooLarge,

    #[error("value exceeded the max length")]
    ValueTooLarge,

    #[error("extra contains separator \\0")]
    ExtraContainsSeparator,

    #[error("invalid ttl")]
    InvalidTtl,

    #[error("entry of {size} bytes cannot fit in a {block_size} byte segment")]
    EntryTooLarge { size: u64, block_size: u64 },

    // -------------------------------------------------------------------------
    // Existence Errors
    // -------------------------------------------------------------------------
    #[error("key not exist")]
    KeyNotExist,

    #[error("key is expired")]
    KeyExpired,

    // -------------------------------------------------------------------------
    // Record / Segment Errors
    // -------------------------------------------------------------------------
    #[error("invalid entry")]
    InvalidEntry,

    #[error("entry or the key of entry is empty")]
    EmptyEntry,

    #[error("invalid crc")]
    InvalidCrc,

    #[error("truncated record at offset {offset} in segment {file_id}")]
    Truncated { file_id: u32, offset: u64 },

    #[error("end of segment file")]
    EndOfFile,

    #[error("segment {0} already exists on disk")]
    SegmentExists(u32),

    #[error("Recovery failed: {0}")]
    Recovery(String),

    // -------------------------------------------------------------------------
    // Indexing Errors
    // -------------------------------------------------------------------------
    #[error("indexer is nil: segment {0} is not open")]
    NilIndexer(u32),

    // -------------------------------------------------------------------------
    // Reclaim Errors
    // -------------------------------------------------------------------------
    #[error("unused space not reach the threshold")]
    ReclaimUnreached,

    #[error("can't do reclaim and single reclaim at the same time")]
    DbIsReclaiming,

    // -------------------------------------------------------------------------
    // Configuration / Serialization Errors
    // -------------------------------------------------------------------------
    #[error("the config file not exist")]
    CfgNotExist,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArgs(String),
}

impl From<serde_json::Error> for RoseError {
    fn from(e: serde_json::Error) -> Self {
        RoseError::Serialization(e.to_string())
    }
}
