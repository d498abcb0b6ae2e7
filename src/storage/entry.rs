//! Record codec
//!
//! An [`Entry`] is the unit appended to a segment file. Decoding is two-phase:
//! [`EntryHeader::decode`] parses the fixed 26-byte header, the caller reads
//! `body_size()` more bytes, and [`Entry::from_parts`] re-slices that body and
//! verifies the value checksum.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, RoseError};

/// crc (4) + key size (4) + value size (4) + extra size (4) + state (2) + timestamp (8)
pub const ENTRY_HEADER_SIZE: usize = 26;

/// Reserved sequence that higher-level multi-field encodings split `extra` on
pub const EXTRA_SEPARATOR: &[u8] = b"\\0";

// =============================================================================
// Data Types and Marks
// =============================================================================

/// Logical data type; each type owns an independent stream of segment files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DataType {
    String = 0,
    List = 1,
    Hash = 2,
    Set = 3,
    ZSet = 4,
}

impl DataType {
    /// Every data type, in tag order
    pub const ALL: [DataType; 5] = [
        DataType::String,
        DataType::List,
        DataType::Hash,
        DataType::Set,
        DataType::ZSet,
    ];

    /// Segment file name suffix
    pub fn suffix(self) -> &'static str {
        match self {
            DataType::String => "str",
            DataType::List => "list",
            DataType::Hash => "hash",
            DataType::Set => "set",
            DataType::ZSet => "zset",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        DataType::ALL.into_iter().find(|t| t.suffix() == suffix)
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        DataType::ALL.get(tag as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Operation marks for string records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StrMark {
    Set = 0,
    Remove = 1,
    /// Timestamp field holds the absolute deadline
    Expire = 2,
    Persist = 3,
}

impl StrMark {
    pub fn from_u8(mark: u8) -> Option<Self> {
        match mark {
            0 => Some(StrMark::Set),
            1 => Some(StrMark::Remove),
            2 => Some(StrMark::Expire),
            3 => Some(StrMark::Persist),
            _ => None,
        }
    }
}

/// Current unix time in seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Header
// =============================================================================

/// Fixed-size record header, big-endian on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub crc: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub extra_size: u32,
    pub state: u16,
    pub timestamp: u64,
}

impl EntryHeader {
    /// Parse the header fields only
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < ENTRY_HEADER_SIZE {
            return Err(RoseError::InvalidEntry);
        }

        Ok(Self {
            crc: buf.get_u32(),
            key_size: buf.get_u32(),
            value_size: buf.get_u32(),
            extra_size: buf.get_u32(),
            state: buf.get_u16(),
            timestamp: buf.get_u64(),
        })
    }

    /// Bytes following the header: key + value + extra
    pub fn body_size(&self) -> u64 {
        self.key_size as u64 + self.value_size as u64 + self.extra_size as u64
    }

    /// Total encoded size of the record
    pub fn entry_size(&self) -> u64 {
        ENTRY_HEADER_SIZE as u64 + self.body_size()
    }

    /// No record is ever written with an empty key, so a zero key size marks
    /// the end of data (clean file end, or the zeroed tail of a mapped file).
    pub fn is_empty(&self) -> bool {
        self.key_size == 0
    }
}

// =============================================================================
// Entry
// =============================================================================

/// A single log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Bytes,
    pub value: Bytes,
    pub extra: Bytes,
    pub data_type: DataType,
    pub mark: u8,
    /// Unix seconds at write time (the deadline for string Expire records)
    pub timestamp: u64,
}

impl Entry {
    /// Build an entry carrying an extra payload
    ///
    /// Fails if `extra` contains [`EXTRA_SEPARATOR`].
    pub fn new(key: Bytes, value: Bytes, extra: Bytes, data_type: DataType, mark: u8) -> Result<Self> {
        if contains(&extra, EXTRA_SEPARATOR) {
            return Err(RoseError::ExtraContainsSeparator);
        }

        Ok(Self {
            key,
            value,
            extra,
            data_type,
            mark,
            timestamp: now_secs(),
        })
    }

    /// Build an entry without an extra payload
    pub fn no_extra(key: Bytes, value: Bytes, data_type: DataType, mark: u8) -> Self {
        Self {
            key,
            value,
            extra: Bytes::new(),
            data_type,
            mark,
            timestamp: now_secs(),
        }
    }

    /// Override the timestamp (used for Expire deadlines)
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// High byte = data type, low byte = operation mark
    pub fn state(&self) -> u16 {
        ((self.data_type as u16) << 8) | self.mark as u16
    }

    /// Encoded size in bytes
    pub fn size(&self) -> u64 {
        (ENTRY_HEADER_SIZE + self.key.len() + self.value.len() + self.extra.len()) as u64
    }

    /// CRC32 over the value bytes
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.value)
    }

    /// Encode into header ++ key ++ value ++ extra
    pub fn encode(&self) -> Result<Bytes> {
        if self.key.is_empty() {
            return Err(RoseError::InvalidEntry);
        }

        let mut buf = BytesMut::with_capacity(self.size() as usize);
        buf.put_u32(self.checksum());
        buf.put_u32(self.key.len() as u32);
        buf.put_u32(self.value.len() as u32);
        buf.put_u32(self.extra.len() as u32);
        buf.put_u16(self.state());
        buf.put_u64(self.timestamp);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);
        buf.put_slice(&self.extra);

        Ok(buf.freeze())
    }

    /// Second decode phase: slice `body` per the header and verify the checksum
    pub fn from_parts(header: &EntryHeader, body: Bytes) -> Result<Self> {
        if body.len() as u64 != header.body_size() {
            return Err(RoseError::InvalidEntry);
        }

        let data_type = DataType::from_u8((header.state >> 8) as u8).ok_or(RoseError::InvalidEntry)?;
        let mark = (header.state & 0xff) as u8;

        let ks = header.key_size as usize;
        let vs = header.value_size as usize;
        let key = body.slice(..ks);
        let value = body.slice(ks..ks + vs);
        let extra = body.slice(ks + vs..);

        if crc32fast::hash(&value) != header.crc {
            return Err(RoseError::InvalidCrc);
        }

        Ok(Self {
            key,
            value,
            extra,
            data_type,
            mark,
            timestamp: header.timestamp,
        })
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
