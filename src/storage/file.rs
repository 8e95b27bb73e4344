//! File Storage
//!
//! Random-access backend issuing explicit seek + read/write calls.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

use super::{out_of_bounds, PageStorage};

/// Storage that writes straight through to the file
///
/// The file length is the logical length: appends extend it exactly, so it
/// also backs the append-only key stream.
pub struct FileStorage {
    path: PathBuf,
    /// `None` once closed
    file: Option<File>,
    /// Cached file length
    len: u64,
    /// Unsynced writes pending
    dirty: bool,
}

impl FileStorage {
    /// Open or create the file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            len,
            dirty: false,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(StoreError::Closed)
    }
}

impl PageStorage for FileStorage {
    fn get(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.len {
            return Err(out_of_bounds(offset, buf.len(), self.len).into());
        }
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn put(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;

        self.len = self.len.max(offset + buf.len() as u64);
        self.dirty = true;
        Ok(())
    }

    fn length(&self) -> u64 {
        self.len
    }

    fn force(&mut self) -> Result<()> {
        if self.dirty {
            self.file()?.sync_data()?;
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
            self.file = None;
        }
        Ok(())
    }
}
