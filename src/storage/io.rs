//! Segment file access methods
//!
//! [`FileIo`] is the capability a segment needs from the file system:
//! positional reads, positional writes, sync. Two implementations exist and
//! produce the same record bytes at the same offsets; the mapped variant
//! additionally pads the file with zeros up to the block size.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::config::FileRwMethod;
use crate::error::{Result, RoseError};

/// Positional I/O over one segment file
pub trait FileIo: Send + Sync {
    /// Read up to `buf.len()` bytes at `offset`, returning how many were read.
    /// A short count means the end of the file (or mapping) was reached.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `data` at `offset`
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Flush written data to stable storage
    fn sync(&self) -> Result<()>;

    /// Readable length in bytes
    fn size(&self) -> u64;
}

/// Open the backend selected by `method`
pub fn open_file_io(path: &Path, method: FileRwMethod, block_size: u64) -> Result<Box<dyn FileIo>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    Ok(match method {
        FileRwMethod::FileIo => Box::new(StdFileIo::new(file)?),
        FileRwMethod::MMap => Box::new(MmapFileIo::new(file, block_size)?),
    })
}

// =============================================================================
// Standard I/O
// =============================================================================

/// Buffered random access through the standard file API
///
/// Reads seek the shared handle, so it sits behind a mutex to allow `&self` reads.
pub struct StdFileIo {
    file: Mutex<File>,
    len: u64,
}

impl StdFileIo {
    pub fn new(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl FileIo for StdFileIo {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        self.len = self.len.max(offset + data.len() as u64);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.len
    }
}

// =============================================================================
// Memory-mapped I/O
// =============================================================================

/// Memory-mapped file pre-sized to the block size
pub struct MmapFileIo {
    mmap: MmapMut,
}

impl MmapFileIo {
    pub fn new(file: File, block_size: u64) -> Result<Self> {
        if file.metadata()?.len() < block_size {
            file.set_len(block_size)?;
        }

        // SAFETY: segment files are private to one open engine; nothing else
        // truncates or remaps them while this mapping is alive.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap })
    }
}

impl FileIo for MmapFileIo {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.mmap.len() as u64;
        if offset >= len {
            return Ok(0);
        }

        let start = offset as usize;
        let n = buf.len().min(self.mmap.len() - start);
        buf[..n].copy_from_slice(&self.mmap[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.mmap.len() as u64 {
            return Err(RoseError::EntryTooLarge {
                size: data.len() as u64,
                block_size: self.mmap.len() as u64,
            });
        }

        self.mmap[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }
}
