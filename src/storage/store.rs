//! Segment Store
//!
//! Owns the segment files of one data type.
//!
//! ## Responsibilities
//! - Discover existing segment files on startup
//! - Keep exactly one active (writable) file, the one with the highest id
//! - Rotate to a fresh active file when an append would overflow the block size
//! - Route positional reads to the active or an archived file

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::FileRwMethod;
use crate::error::{Result, RoseError};

use super::entry::{DataType, Entry};
use super::file::{parse_segment_file_name, segment_file_name, DbFile};

/// Per-type collection of segment files
pub struct SegmentStore {
    dir: PathBuf,
    data_type: DataType,
    method: FileRwMethod,
    block_size: u64,
    /// fsync after every append
    sync_writes: bool,
    active: DbFile,
    /// Read-only files, never appended to again
    archived: BTreeMap<u32, DbFile>,
}

impl SegmentStore {
    /// Scan `dir` for segment files and group their ids by data type (ascending)
    pub fn discover(dir: &Path) -> Result<BTreeMap<DataType, Vec<u32>>> {
        let mut ids: BTreeMap<DataType, Vec<u32>> =
            DataType::ALL.into_iter().map(|t| (t, Vec::new())).collect();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();
            if let Some((id, data_type)) = parse_segment_file_name(&name.to_string_lossy()) {
                ids.entry(data_type).or_default().push(id);
            }
        }

        for list in ids.values_mut() {
            list.sort_unstable();
        }
        Ok(ids)
    }

    /// Open the given (ascending) segment ids; the last becomes the active file.
    /// With no ids, an empty active file with id 0 is created.
    pub fn open(
        dir: &Path,
        data_type: DataType,
        ids: &[u32],
        method: FileRwMethod,
        block_size: u64,
        sync_writes: bool,
    ) -> Result<Self> {
        let (active_id, archived_ids) = match ids.split_last() {
            Some((last, rest)) => (*last, rest),
            None => (0, &[][..]),
        };

        let mut archived = BTreeMap::new();
        for &id in archived_ids {
            archived.insert(id, DbFile::open(dir, id, data_type, method, block_size)?);
        }
        let active = DbFile::open(dir, active_id, data_type, method, block_size)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            data_type,
            method,
            block_size,
            sync_writes,
            active,
            archived,
        })
    }

    /// Append an entry, rotating first if it would not fit in the active file
    ///
    /// Returns the `(file_id, offset)` the entry was written at.
    pub fn append(&mut self, entry: &Entry) -> Result<(u32, u64)> {
        let size = entry.size();
        if size > self.block_size {
            return Err(RoseError::EntryTooLarge {
                size,
                block_size: self.block_size,
            });
        }

        if self.active.offset() + size > self.block_size {
            self.rotate()?;
        }

        let offset = self.active.offset();
        self.active.append(entry)?;

        if self.sync_writes {
            self.active.sync()?;
        }

        Ok((self.active.id(), offset))
    }

    /// Archive the active file and open `id + 1` as the new active file
    ///
    /// Fails with `SegmentExists` if a file with that id is already on disk;
    /// appending over it would let its stale records win on replay.
    fn rotate(&mut self) -> Result<()> {
        let next_id = self.active.id() + 1;
        if self.dir.join(segment_file_name(next_id, self.data_type)).exists() {
            return Err(RoseError::SegmentExists(next_id));
        }

        self.active.sync()?;
        let fresh = DbFile::open(&self.dir, next_id, self.data_type, self.method, self.block_size)?;
        let old = std::mem::replace(&mut self.active, fresh);

        debug!(
            data_type = ?self.data_type,
            archived = old.id(),
            active = next_id,
            "rotated segment file"
        );
        self.archived.insert(old.id(), old);
        Ok(())
    }

    /// Read the record at `offset` in segment `file_id`
    pub fn read_at(&self, file_id: u32, offset: u64) -> Result<Entry> {
        self.file(file_id)
            .ok_or(RoseError::NilIndexer(file_id))?
            .read_at(offset)
    }

    /// Look up an open segment, active or archived
    pub fn file(&self, file_id: u32) -> Option<&DbFile> {
        if file_id == self.active.id() {
            Some(&self.active)
        } else {
            self.archived.get(&file_id)
        }
    }

    /// All segments in ascending id order, the active file last
    pub fn files(&self) -> impl Iterator<Item = &DbFile> {
        self.archived.values().chain(std::iter::once(&self.active))
    }

    pub fn active(&self) -> &DbFile {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut DbFile {
        &mut self.active
    }

    pub fn active_id(&self) -> u32 {
        self.active.id()
    }

    pub fn archived_ids(&self) -> Vec<u32> {
        self.archived.keys().copied().collect()
    }

    /// Write offset of the active file
    pub fn write_offset(&self) -> u64 {
        self.active.offset()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sync(&self) -> Result<()> {
        self.active.sync()
    }

    /// Close an archived segment and delete it from disk
    pub fn remove_archived(&mut self, file_id: u32) -> Result<()> {
        if let Some(file) = self.archived.remove(&file_id) {
            let path = file.path().to_path_buf();
            file.close(false)?;
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Close every file, syncing the active one when asked
    pub fn close(self, sync: bool) -> Result<()> {
        for (_, file) in self.archived {
            file.close(false)?;
        }
        self.active.close(sync)
    }
}
