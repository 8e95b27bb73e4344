//! Store core
//!
//! Per-store state and the lifecycle/integrity bookkeeping shared by every
//! hash directory: header magic, dirty/corrupted flags, key writes, flush
//! and close.
//!
//! ## States
//! ```text
//! Fresh ──open──► Dirty ◄──mutation── Clean
//!                   │                   ▲
//!                   └──────flush────────┘
//! any ──structural fault──► Corrupted      any ──close──► Closed
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::descriptor::KeyDescriptor;
use crate::directory::{HashDirectory, KeyLookup};
use crate::error::{Result, StoreError};
use crate::keystream::{keystream_path, KeyStream};
use crate::storage::{open_storage, PageStorage};

use super::header::{CLEAN_MAGIC, DIRTY_MAGIC, META_DATA_OFFSET, STATUS_OFFSET};

/// Storage, key stream and flags of one open store
///
/// Hash directories receive `&mut StoreCore` in every hook; all byte-level
/// mutation goes through [`StoreCore::storage_mut`], which stamps the dirty
/// magic before handing out the storage.
pub struct StoreCore<D: KeyDescriptor> {
    path: PathBuf,
    storage: Box<dyn PageStorage>,
    /// `None` for inline-keyed stores
    keys: Option<KeyStream>,
    descriptor: Arc<D>,
    dirty: bool,
    corrupted: bool,
    closed: bool,
}

impl<D: KeyDescriptor> StoreCore<D> {
    /// Open or create the primary file and, for stream keys, its key stream
    pub(crate) fn open<H: HashDirectory<D>>(
        path: &Path,
        descriptor: Arc<D>,
        directory: &mut H,
        config: &Config,
    ) -> Result<Self> {
        let keys_path = keystream_path(path);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            // A key stream without its primary file is unreachable garbage
            if keys_path.exists() {
                debug!(path = %keys_path.display(), "removing stale key stream");
                fs::remove_file(&keys_path)?;
            }
        }

        let storage = open_storage(path, config)?;
        let mut core = Self {
            path: path.to_path_buf(),
            storage,
            keys: None,
            descriptor,
            dirty: false,
            corrupted: false,
            closed: false,
        };

        if let Err(e) = core.init(directory, &keys_path) {
            let _ = core.storage.close();
            return Err(e);
        }
        Ok(core)
    }

    fn init<H: HashDirectory<D>>(&mut self, directory: &mut H, keys_path: &Path) -> Result<()> {
        if self.storage.length() == 0 {
            info!(path = %self.path.display(), "creating enumerator");
            self.mark_dirty()?;
            self.put_meta_data(0)?;
            directory.setup_empty_file(self)?;
        } else {
            // An unreadable header counts as dirty
            let magic = self.storage.get_int(STATUS_OFFSET).unwrap_or(DIRTY_MAGIC);
            if magic != CLEAN_MAGIC {
                warn!(path = %self.path.display(), magic = %format!("{:#010x}", magic), "enumerator was not closed cleanly");
                return Err(self.corruption(format!(
                    "status magic {:#010x} is not the clean-close marker",
                    magic
                )));
            }
            directory.load(self)?;
        }

        if self.descriptor.inline().is_none() {
            self.keys = Some(KeyStream::open(keys_path)?);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    /// Read-only view of the primary storage
    pub fn storage(&self) -> &dyn PageStorage {
        &*self.storage
    }

    /// Mutable primary storage; marks the store dirty first
    pub fn storage_mut(&mut self) -> Result<&mut dyn PageStorage> {
        self.mark_dirty()?;
        Ok(&mut *self.storage)
    }

    pub fn keys(&self) -> Option<&KeyStream> {
        self.keys.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Corruption fault naming this store's file
    pub fn corruption(&self, reason: impl Into<String>) -> StoreError {
        StoreError::corrupted(&self.path, reason)
    }

    /// Fail unless structural operations are still allowed
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.corrupted {
            return Err(self.corruption("store was marked corrupted earlier"));
        }
        Ok(())
    }

    // =========================================================================
    // Header Metadata
    // =========================================================================

    /// Directory-defined value kept in the header
    pub fn meta_data(&self) -> Result<u32> {
        self.storage.get_int(META_DATA_OFFSET)
    }

    pub fn put_meta_data(&mut self, value: u32) -> Result<()> {
        self.storage_mut()?.put_int(META_DATA_OFFSET, value)
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Persist a new key and write its record, returning the record's offset
    pub fn write_data<H: HashDirectory<D>>(
        &mut self,
        directory: &mut H,
        lookup: &KeyLookup<'_, D::Key>,
    ) -> Result<u64> {
        self.mark_dirty()?;

        let data_offset = match self.descriptor.inline() {
            Some(inline) => inline.to_int(lookup.key) as u64,
            None => {
                let keys = self
                    .keys
                    .as_mut()
                    .ok_or_else(|| StoreError::Unsupported("key stream is not open".to_string()))?;
                keys.append(lookup.encoded)?
            }
        };

        let mut buf = vec![0u8; directory.record_size()];
        directory.setup_record(lookup.hash, data_offset, &mut buf);

        let pos = directory.record_write_offset(self, &buf)?;
        self.storage_mut()?.put(pos, &buf)?;
        Ok(pos)
    }

    /// Decode the key whose record holds `data_offset`
    pub fn read_key(&self, data_offset: u64) -> Result<D::Key> {
        if let Some(inline) = self.descriptor.inline() {
            let value = u32::try_from(data_offset)
                .map_err(|_| self.corruption(format!("inline key {} exceeds u32", data_offset)))?;
            return Ok(inline.from_int(value));
        }

        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| StoreError::Unsupported("key stream is not open".to_string()))?;
        keys.read_key(&*self.descriptor, data_offset)
    }

    /// True when the key stored at `data_offset` equals `key`
    pub fn key_matches(&self, key: &D::Key, data_offset: u64) -> Result<bool> {
        match self.descriptor.inline() {
            Some(inline) => Ok(inline.to_int(key) as u64 == data_offset),
            None => Ok(self.read_key(data_offset)? == *key),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Stamp the dirty magic before the first mutation
    pub(crate) fn mark_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            self.storage.put_int(STATUS_OFFSET, DIRTY_MAGIC)?;
            self.dirty = true;
        }
        Ok(())
    }

    fn mark_clean(&mut self) -> Result<()> {
        if !self.corrupted {
            self.storage.put_int(STATUS_OFFSET, CLEAN_MAGIC)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.storage.is_dirty() || self.dirty {
            if self.dirty {
                self.mark_clean()?;
            }
            self.storage.force()?;
        }
        Ok(())
    }

    /// Durably persist the key stream, then the primary file
    pub(crate) fn force(&mut self) -> Result<()> {
        if let Some(keys) = self.keys.as_mut() {
            keys.force()?;
        }
        self.flush()
    }

    /// Enter the terminal corrupted state, leaving a dirty stamp on disk
    pub(crate) fn mark_corrupted(&mut self, cause: &StoreError) {
        if self.corrupted {
            return;
        }
        self.corrupted = true;
        error!(path = %self.path.display(), error = %cause, "enumerator marked corrupted");

        // Best effort: the next open must see the dirty magic
        if self.mark_dirty().is_ok() {
            let _ = self.force();
        }
    }

    /// Flush and release both files; later calls are no-ops
    pub(crate) fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let flushed = self.force();
        let keys_closed = match self.keys.as_mut() {
            Some(keys) => keys.close(),
            None => Ok(()),
        };
        let storage_closed = self.storage.close();

        if flushed.is_ok() && !self.corrupted {
            info!(path = %self.path.display(), "enumerator closed cleanly");
        }
        flushed.and(keys_closed).and(storage_closed)
    }
}
