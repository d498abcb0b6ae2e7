//! Segment file
//!
//! One append-only file of encoded records for a single data type.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::config::FileRwMethod;
use crate::error::{Result, RoseError};

use super::entry::{DataType, Entry, EntryHeader, ENTRY_HEADER_SIZE};
use super::io::{open_file_io, FileIo};

/// `"{id:09}.data.{suffix}"`
pub fn segment_file_name(id: u32, data_type: DataType) -> String {
    format!("{:09}.data.{}", id, data_type.suffix())
}

/// "000000042.data.str" → Some((42, String))
pub fn parse_segment_file_name(name: &str) -> Option<(u32, DataType)> {
    let mut parts = name.split('.');
    let id = parts.next()?.parse().ok()?;
    if parts.next()? != "data" {
        return None;
    }
    let data_type = DataType::from_suffix(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((id, data_type))
}

/// An open segment file
pub struct DbFile {
    id: u32,
    data_type: DataType,
    path: PathBuf,
    /// Next write position
    offset: u64,
    io: Box<dyn FileIo>,
}

impl DbFile {
    /// Open (or create) segment `id` of `data_type` inside `dir`
    ///
    /// The write offset starts at 0; callers that resume an existing file set
    /// it from a scan or from persisted metadata.
    pub fn open(
        dir: &Path,
        id: u32,
        data_type: DataType,
        method: FileRwMethod,
        block_size: u64,
    ) -> Result<Self> {
        let path = dir.join(segment_file_name(id, data_type));
        let io = open_file_io(&path, method, block_size)?;

        Ok(Self {
            id,
            data_type,
            path,
            offset: 0,
            io,
        })
    }

    /// Read the record stored at `offset`
    ///
    /// Returns `EndOfFile` when no record starts there, `Truncated` when the
    /// header promises more bytes than the file holds, `InvalidCrc` when the
    /// value does not match its checksum.
    pub fn read_at(&self, offset: u64) -> Result<Entry> {
        let mut header_buf = [0u8; ENTRY_HEADER_SIZE];
        let n = self.io.read_at(offset, &mut header_buf)?;

        if n < ENTRY_HEADER_SIZE {
            if header_buf[..n].iter().all(|&b| b == 0) {
                return Err(RoseError::EndOfFile);
            }
            return Err(self.truncated(offset));
        }

        let header = EntryHeader::decode(&header_buf)?;
        if header.is_empty() {
            return Err(RoseError::EndOfFile);
        }

        if offset + header.entry_size() > self.io.size() {
            return Err(self.truncated(offset));
        }

        let mut body = vec![0u8; header.body_size() as usize];
        let n = self.io.read_at(offset + ENTRY_HEADER_SIZE as u64, &mut body)?;
        if n < body.len() {
            return Err(self.truncated(offset));
        }

        Entry::from_parts(&header, Bytes::from(body))
    }

    /// Append at the tracked write offset
    pub fn append(&mut self, entry: &Entry) -> Result<()> {
        if entry.key.is_empty() {
            return Err(RoseError::EmptyEntry);
        }

        let buf = entry.encode()?;
        self.io.write_at(self.offset, &buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.io.sync()
    }

    /// Close the file, flushing first when asked
    pub fn close(self, sync: bool) -> Result<()> {
        if sync {
            self.io.sync()?;
        }
        Ok(())
    }

    /// Sequential scan from offset 0
    pub fn scan(&self) -> SegmentScan<'_> {
        SegmentScan {
            file: self,
            offset: 0,
            done: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    fn truncated(&self, offset: u64) -> RoseError {
        RoseError::Truncated {
            file_id: self.id,
            offset,
        }
    }
}

/// Iterator over `(offset, entry)` pairs until the end of data
///
/// Stops after the first error; `offset()` is then the position of the
/// record that failed, or the end of data after a clean finish.
pub struct SegmentScan<'a> {
    file: &'a DbFile,
    offset: u64,
    done: bool,
}

impl SegmentScan<'_> {
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Iterator for SegmentScan<'_> {
    type Item = Result<(u64, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.file.read_at(self.offset) {
            Ok(entry) => {
                let at = self.offset;
                self.offset += entry.size();
                Some(Ok((at, entry)))
            }
            Err(RoseError::EndOfFile) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
