//! Storage Module
//!
//! Byte-addressable page storage backing a single growable file.
//!
//! ## Responsibilities
//! - Fixed-width integer reads/writes at absolute offsets
//! - Raw byte-range reads/writes
//! - Implicit growth when writing past the current extent
//! - Flushing to durable media (`force`)
//!
//! ## Backends
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │ MappedStorage                │   │ FileStorage                  │
//! │  memmap2::MmapMut            │   │  positioned read/write       │
//! │  grows in page_size steps    │   │  grows exactly on append     │
//! └──────────────┬───────────────┘   └───────────────┬──────────────┘
//!                └──────────── PageStorage ──────────┘
//! ```
//!
//! All integers are little-endian. Reads past `length()` fail with
//! `UnexpectedEof`; writes past it extend the file.

mod file;
mod mapped;

use std::io;
use std::path::Path;

use crate::config::{Config, StorageBackend};
use crate::error::Result;

pub use file::FileStorage;
pub use mapped::MappedStorage;

/// Random-access contract shared by every storage backend
pub trait PageStorage: Send {
    /// Read `buf.len()` bytes starting at `offset`
    fn get(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` at `offset`, growing the file when needed
    fn put(&mut self, offset: u64, buf: &[u8]) -> Result<()>;

    /// Current extent of the storage in bytes
    fn length(&self) -> u64;

    /// Flush every pending write to durable media
    fn force(&mut self) -> Result<()>;

    /// True when writes happened since the last `force`
    fn is_dirty(&self) -> bool;

    /// Flush and release the underlying file
    fn close(&mut self) -> Result<()>;

    fn get_int(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.get(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn put_int(&mut self, offset: u64, value: u32) -> Result<()> {
        self.put(offset, &value.to_le_bytes())
    }

    fn get_long(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.get(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn put_long(&mut self, offset: u64, value: u64) -> Result<()> {
        self.put(offset, &value.to_le_bytes())
    }
}

/// Open the primary storage for `path` using the configured backend
pub fn open_storage(path: &Path, config: &Config) -> Result<Box<dyn PageStorage>> {
    Ok(match config.storage_backend {
        StorageBackend::Mapped => Box::new(MappedStorage::open(path, config.initial_size, config.page_size)?),
        StorageBackend::RandomAccess => Box::new(FileStorage::open(path)?),
    })
}

pub(crate) fn out_of_bounds(offset: u64, len: usize, extent: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("read of {} bytes at offset {} past storage extent {}", len, offset, extent),
    )
}
