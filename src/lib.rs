//! # rosedb
//!
//! An embedded key-value store built on append-only segment files:
//! - One log stream per data type (string, list, hash, set, zset)
//! - Ordered in-memory index, optionally holding values
//! - Parallel crash recovery by replaying the segments
//! - Lazy key expiration and space reclaim
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Command Registry                          │
//! │              (name → handler, built once)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        RoseDb                                │
//! │            (one RwLock<Partition> per data type)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────┐
//!          │            │            │
//!          ▼            ▼            ▼
//!   ┌─────────────┐ ┌─────────┐ ┌─────────────┐
//!   │    Index    │ │ Expires │ │   Segment   │
//!   │ (SkipMap)   │ │         │ │   Store     │
//!   └─────────────┘ └─────────┘ └──────┬──────┘
//!                                      │
//!                                      ▼
//!                              ┌─────────────┐
//!                              │  Segment    │
//!                              │  Files      │
//!                              │ (io / mmap) │
//!                              └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod index;
pub mod expire;
pub mod recovery;
pub mod reclaim;
pub mod engine;
pub mod cmd;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, RoseError};
pub use config::{Config, FileRwMethod, IndexMode};
pub use engine::RoseDb;
pub use storage::DataType;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rosedb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
