//! Storage Module
//!
//! Append-only segment files, one stream per data type.
//!
//! ## Responsibilities
//! - Encode/decode records with a value checksum
//! - Append records to the active segment, rotate at the block size
//! - Serve positional reads from active and archived segments
//! - Persist write offsets and reclaimable space (`DB.META`)
//!
//! ## Record Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Header (26 bytes, big-endian)                                   │
//! │   CRC (4) | KeySize (4) | ValueSize (4) | ExtraSize (4)         │
//! │   State (2: type << 8 | mark) | Timestamp (8)                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Key | Value | Extra                                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//! The CRC covers the value bytes only.
//!
//! ## Directory Layout
//! ```text
//! {dir_path}/
//!   ├── 000000000.data.str     (archived)
//!   ├── 000000001.data.str     (active: highest id)
//!   ├── 000000000.data.list
//!   ├── DB.META
//!   └── DB.CFG
//! ```

mod entry;
mod file;
mod io;
mod meta;
mod store;

pub use entry::{
    now_secs, DataType, Entry, EntryHeader, StrMark, ENTRY_HEADER_SIZE, EXTRA_SEPARATOR,
};
pub use file::{parse_segment_file_name, segment_file_name, DbFile, SegmentScan};
pub use io::{open_file_io, FileIo, MmapFileIo, StdFileIo};
pub use meta::{DbMeta, META_FILE_NAME};
pub use store::SegmentStore;
