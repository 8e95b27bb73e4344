//! Key Stream Module
//!
//! Append-only sidecar file holding serialized keys.
//!
//! ## Responsibilities
//! - Append a key's payload once, at first insertion
//! - Random reads of one key by offset
//! - Sequential iteration from offset 0 until exhaustion
//!
//! ## File Format
//! ```text
//! ┌──────────────────┬──────────────────┬─────┬──────────────────┐
//! │ payload @ 0      │ payload @ n0     │ ... │ payload @ nk     │
//! └──────────────────┴──────────────────┴─────┴──────────────────┘
//! ```
//! Payloads are self-delimiting (the descriptor owns the framing); an
//! offset is the permanent anchor stored in the owning record.

mod reader;

use std::path::{Path, PathBuf};

use crate::descriptor::KeyDescriptor;
use crate::error::{Result, StoreError};
use crate::storage::{FileStorage, PageStorage};

pub use reader::StreamReader;

/// Suffix appended to the primary file name
pub const KEYSTREAM_SUFFIX: &str = ".keystream";

/// Sidecar path for a primary file
pub fn keystream_path(primary: &Path) -> PathBuf {
    let mut name = primary.as_os_str().to_owned();
    name.push(KEYSTREAM_SUFFIX);
    PathBuf::from(name)
}

/// Append-only store of serialized keys
pub struct KeyStream {
    storage: FileStorage,
}

impl KeyStream {
    /// Open or create the key stream at `path`
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            storage: FileStorage::open(path)?,
        })
    }

    /// Offset the next append lands at
    pub fn length(&self) -> u64 {
        self.storage.length()
    }

    /// Path of the sidecar file
    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    /// Append an encoded payload, returning its offset
    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        let offset = self.storage.length();
        self.storage.put(offset, payload)?;
        Ok(offset)
    }

    /// Decode the key stored at `offset`
    pub fn read_key<D: KeyDescriptor>(&self, descriptor: &D, offset: u64) -> Result<D::Key> {
        let limit = self.storage.length();
        if offset >= limit {
            return Err(StoreError::Serialization(format!(
                "key offset {} beyond key stream length {}",
                offset, limit
            )));
        }
        let mut reader = StreamReader::new(&self.storage, offset, limit);
        descriptor.decode(&mut reader, limit - offset)
    }

    /// Visit every key in append order until exhaustion or until `f` returns false
    ///
    /// Returns false if iteration was stopped early.
    pub fn for_each<D, F>(&self, descriptor: &D, mut f: F) -> Result<bool>
    where
        D: KeyDescriptor,
        F: FnMut(D::Key) -> Result<bool>,
    {
        let limit = self.storage.length();
        let mut reader = StreamReader::new(&self.storage, 0, limit);

        while reader.position() < limit {
            let remaining = limit - reader.position();
            let key = descriptor.decode(&mut reader, remaining)?;
            if !f(key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Decode up to `max` keys starting at `offset`
    ///
    /// Returns the keys and the offset just past the last one decoded. An
    /// empty batch means `offset` is the end of the stream.
    pub fn read_batch<D: KeyDescriptor>(
        &self,
        descriptor: &D,
        offset: u64,
        max: usize,
    ) -> Result<(Vec<D::Key>, u64)> {
        let limit = self.storage.length();
        let mut reader = StreamReader::new(&self.storage, offset, limit);
        let mut keys = Vec::new();

        while keys.len() < max && reader.position() < limit {
            let remaining = limit - reader.position();
            keys.push(descriptor.decode(&mut reader, remaining)?);
        }
        Ok((keys, reader.position()))
    }

    pub fn force(&mut self) -> Result<()> {
        self.storage.force()
    }

    pub fn is_dirty(&self) -> bool {
        self.storage.is_dirty()
    }

    pub fn close(&mut self) -> Result<()> {
        self.storage.close()
    }
}
