//! Mapped Storage
//!
//! Memory-mapped backend that remaps the file whenever it must grow.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use crate::error::{Result, StoreError};

use super::{out_of_bounds, PageStorage};

/// Storage backed by a shared writable mapping of the whole file
///
/// `length()` is the mapped (physical) size. Bytes past the last write read
/// as zero, so callers keep their own logical extent.
pub struct MappedStorage {
    path: PathBuf,
    /// `None` once closed
    file: Option<File>,
    /// `None` while the file is empty
    mmap: Option<MmapMut>,
    /// First growth target for an empty file
    initial_size: u64,
    /// Growth granularity
    page_size: u64,
    dirty: bool,
}

impl MappedStorage {
    /// Open or create the file at `path` and map its current contents
    pub fn open(path: &Path, initial_size: u64, page_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mmap = Self::map(&file)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            mmap,
            initial_size: initial_size.max(page_size),
            page_size,
            dirty: false,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map(file: &File) -> Result<Option<MmapMut>> {
        if file.metadata()?.len() == 0 {
            return Ok(None);
        }
        // Safety: the file is owned by this storage for its whole lifetime and
        // is only resized after the previous mapping has been dropped.
        let mmap = unsafe { MmapOptions::new().map_mut(file)? };
        Ok(Some(mmap))
    }

    /// Extend the file so that `required` bytes are addressable
    fn grow(&mut self, required: u64) -> Result<()> {
        let current = self.length();
        let mut target = if current == 0 { self.initial_size } else { current * 2 };
        target = target.max(required);
        target = target.div_ceil(self.page_size) * self.page_size;

        debug!(path = %self.path.display(), from = current, to = target, "growing mapped storage");

        if let Some(mmap) = self.mmap.take() {
            mmap.flush()?;
        }
        let file = self.file.as_ref().ok_or(StoreError::Closed)?;
        file.set_len(target)?;
        self.mmap = Self::map(file)?;
        Ok(())
    }
}

impl PageStorage for MappedStorage {
    fn get(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if self.file.is_none() {
            return Err(StoreError::Closed);
        }
        let end = offset + buf.len() as u64;
        match &self.mmap {
            Some(mmap) if end <= mmap.len() as u64 => {
                buf.copy_from_slice(&mmap[offset as usize..end as usize]);
                Ok(())
            }
            _ => Err(out_of_bounds(offset, buf.len(), self.length()).into()),
        }
    }

    fn put(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        if self.file.is_none() {
            return Err(StoreError::Closed);
        }
        let end = offset + buf.len() as u64;
        if end > self.length() {
            self.grow(end)?;
        }
        let mmap = self.mmap.as_mut().ok_or(StoreError::Closed)?;
        mmap[offset as usize..end as usize].copy_from_slice(buf);
        self.dirty = true;
        Ok(())
    }

    fn length(&self) -> u64 {
        self.mmap.as_ref().map_or(0, |m| m.len() as u64)
    }

    fn force(&mut self) -> Result<()> {
        if self.dirty {
            if let Some(mmap) = &self.mmap {
                mmap.flush()?;
            }
            self.dirty = false;
        }
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn close(&mut self) -> Result<()> {
        if self.file.is_some() {
            self.force()?;
            self.mmap = None;
            self.file = None;
        }
        Ok(())
    }
}
