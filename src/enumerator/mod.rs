//! Enumerator Module
//!
//! The persistent enumerator: assigns a stable, dense id to every distinct
//! key it has seen and maps ids back to keys.
//!
//! ## Lookup Path
//! ```text
//! enumerate(key)
//!   │
//!   ├─► cache.get(store ‖ key) ──hit──► id
//!   │
//!   └─miss─► storage lock → store monitor
//!              └─► directory.enumerate_impl(key)
//!                    ├─ walk bucket chain (hash, then key equality)
//!                    └─ absent: append key + record, maybe rehash
//!            cache.put(store ‖ key, id) ──► id
//! ```
//!
//! Any fault raised while walking or mutating the directory marks the store
//! corrupted: the dirty magic is left on disk so the next open refuses the
//! file, and every later structural call fails. `close()` keeps working.

mod store;
mod header;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::context::{EnumContext, StoreId};
use crate::descriptor::KeyDescriptor;
use crate::directory::{ChainedHashDirectory, HashDirectory, KeyLookup};
use crate::error::{Result, StoreError};

pub use store::StoreCore;
pub use header::{
    inspect_header, HeaderStatus, CLEAN_MAGIC, DATA_START, DIRTY_MAGIC, FORMAT_VERSION,
    META_DATA_OFFSET, NULL_ID,
};

/// Length of the store-identity prefix on cache keys
const PREFIX_LEN: usize = 8;

/// Keys decoded per lock acquisition in `iterate_data`
const ITERATE_BATCH: usize = 1024;

struct Inner<D: KeyDescriptor, H> {
    core: StoreCore<D>,
    directory: H,
}

/// Durable key → id enumerator bound to one primary file (plus key stream)
///
/// ## Concurrency
/// Safe to share across threads (`Arc<PersistentEnumerator<_>>`). Lookups
/// that miss the cache take the context's storage lock, then this store's
/// monitor, so two concurrent `enumerate` calls for the same key observe the
/// same id and only one record is created.
pub struct PersistentEnumerator<D: KeyDescriptor, H: HashDirectory<D> = ChainedHashDirectory> {
    context: Arc<EnumContext>,
    store_id: StoreId,
    descriptor: Arc<D>,
    path: PathBuf,
    /// Mirror the core's flags for the lock-free cache path
    closed: AtomicBool,
    corrupted: AtomicBool,
    inner: Mutex<Inner<D, H>>,
}

impl<D: KeyDescriptor> PersistentEnumerator<D, ChainedHashDirectory> {
    /// Open or create an enumerator at `path` with the default directory
    pub fn open(
        path: impl AsRef<Path>,
        descriptor: D,
        config: &Config,
        context: Arc<EnumContext>,
    ) -> Result<Self> {
        let directory = ChainedHashDirectory::from_config(config);
        Self::open_with_directory(path, descriptor, directory, config, context)
    }
}

impl<D: KeyDescriptor, H: HashDirectory<D>> PersistentEnumerator<D, H> {
    /// Open or create an enumerator using a custom hash directory
    ///
    /// Fails with a corruption fault when an existing file was not closed
    /// cleanly.
    pub fn open_with_directory(
        path: impl AsRef<Path>,
        descriptor: D,
        mut directory: H,
        config: &Config,
        context: Arc<EnumContext>,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let descriptor = Arc::new(descriptor);

        let core = {
            let _io = context.lock_storage();
            StoreCore::open(path, Arc::clone(&descriptor), &mut directory, config)?
        };
        let store_id = context.allocate_store_id();

        debug!(path = %path.display(), store = store_id.get(), "opened enumerator");

        Ok(Self {
            context,
            store_id,
            descriptor,
            path: path.to_path_buf(),
            closed: AtomicBool::new(false),
            corrupted: AtomicBool::new(false),
            inner: Mutex::new(Inner { core, directory }),
        })
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// Id of `key`, assigning a new one if the key was never seen
    pub fn enumerate(&self, key: &D::Key) -> Result<u32> {
        let cache_key = self.cache_key(key)?;
        if let Some(id) = self.context.cache().get(&cache_key) {
            return Ok(id);
        }

        let id = self.enumerate_locked(key, &cache_key, true)?;
        self.context.cache().put(&cache_key, id);
        Ok(id)
    }

    /// Id of `key`, or NULL_ID if it was never enumerated; never allocates
    pub fn try_enumerate(&self, key: &D::Key) -> Result<u32> {
        let cache_key = self.cache_key(key)?;
        if let Some(id) = self.context.cache().get(&cache_key) {
            return Ok(id);
        }

        let id = self.enumerate_locked(key, &cache_key, false)?;
        if id != NULL_ID {
            self.context.cache().put(&cache_key, id);
        }
        Ok(id)
    }

    /// Key previously assigned `id`
    pub fn value_of(&self, id: u32) -> Result<D::Key> {
        let _io = self.context.lock_storage();
        let mut inner = self.inner.lock();
        let Inner { core, directory } = &mut *inner;
        core.ensure_usable()?;

        match directory.index_to_addr(core, id).and_then(|addr| core.read_key(addr)) {
            Ok(key) => Ok(key),
            Err(StoreError::InvalidId(id)) => Err(StoreError::InvalidId(id)),
            Err(e) => Err(self.structural_fault(core, e)),
        }
    }

    /// Cache key: store identity followed by the encoded key
    fn cache_key(&self, key: &D::Key) -> Result<Vec<u8>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        if self.corrupted.load(Ordering::Acquire) {
            return Err(StoreError::corrupted(&self.path, "store was marked corrupted earlier"));
        }
        let mut buf = Vec::with_capacity(PREFIX_LEN + 32);
        buf.extend_from_slice(&self.store_id.prefix());
        self.descriptor.encode(key, &mut buf)?;
        Ok(buf)
    }

    fn enumerate_locked(&self, key: &D::Key, cache_key: &[u8], insert: bool) -> Result<u32> {
        let encoded = &cache_key[PREFIX_LEN..];
        let lookup = KeyLookup {
            key,
            encoded,
            hash: self.descriptor.hash_code(encoded),
        };

        let _io = self.context.lock_storage();
        let mut inner = self.inner.lock();
        let Inner { core, directory } = &mut *inner;
        core.ensure_usable()?;

        directory
            .enumerate_impl(core, &lookup, insert)
            .map_err(|e| self.structural_fault(core, e))
    }

    /// Mark the store corrupted for faults that hit the directory
    fn structural_fault(&self, core: &mut StoreCore<D>, e: StoreError) -> StoreError {
        if !e.is_structural() {
            return e;
        }
        core.mark_corrupted(&e);
        self.corrupted.store(true, Ordering::Release);
        if e.is_corruption() {
            e
        } else {
            core.corruption(e.to_string())
        }
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Visit every assigned id from 1 upward; stops when `visitor` returns false
    ///
    /// Ids are collected under the store lock and visited after it is
    /// released, so the visitor may call back into this enumerator.
    pub fn traverse_all_records<F>(&self, mut visitor: F) -> Result<bool>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let ids = {
            let _io = self.context.lock_storage();
            let mut inner = self.inner.lock();
            let Inner { core, directory } = &mut *inner;
            core.ensure_usable()?;

            let mut ids = Vec::new();
            directory
                .traverse_all_records(core, &mut |id| {
                    ids.push(id);
                    Ok(true)
                })
                .map_err(|e| self.structural_fault(core, e))?;
            ids
        };

        for id in ids {
            if !visitor(id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Decode the key of every id accepted by `filter` and hand it to `processor`
    pub fn process_all_data<F>(&self, mut processor: F, filter: Option<&dyn Fn(u32) -> bool>) -> Result<bool>
    where
        F: FnMut(D::Key) -> Result<bool>,
    {
        self.traverse_all_records(|id| {
            if filter.map_or(true, |accept| accept(id)) {
                processor(self.value_of(id)?)
            } else {
                Ok(true)
            }
        })
    }

    /// All keys accepted by `filter`, in id order
    pub fn get_all_data(&self, filter: Option<&dyn Fn(u32) -> bool>) -> Result<Vec<D::Key>> {
        let mut keys = Vec::new();
        self.process_all_data(
            |key| {
                keys.push(key);
                Ok(true)
            },
            filter,
        )?;
        Ok(keys)
    }

    /// Read the key stream directly, bypassing the directory
    ///
    /// Meant for diagnostics and rebuilds. Keys come in append order and are
    /// decoded in batches, with the locks released while `processor` runs, so
    /// keys appended during the scan are visited too. Fails with
    /// `Unsupported` for inline-keyed enumerators.
    pub fn iterate_data<F>(&self, mut processor: F) -> Result<bool>
    where
        F: FnMut(D::Key) -> Result<bool>,
    {
        let mut offset = 0;
        loop {
            let (keys, next) = {
                let _io = self.context.lock_storage();
                let mut inner = self.inner.lock();
                let core = &mut inner.core;
                core.ensure_usable()?;

                let stream = core.keys().ok_or_else(|| {
                    StoreError::Unsupported("iteration over inline integer keys is not supported".to_string())
                })?;

                match stream.read_batch(core.descriptor(), offset, ITERATE_BATCH) {
                    Ok(batch) => batch,
                    Err(e) => return Err(self.structural_fault(core, e)),
                }
            };

            if keys.is_empty() {
                return Ok(true);
            }
            for key in keys {
                if !processor(key)? {
                    return Ok(false);
                }
            }
            offset = next;
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Durably persist pending writes and stamp the clean magic
    ///
    /// A corrupted store is flushed but keeps its dirty stamp. No-op once
    /// closed.
    pub fn force(&self) -> Result<()> {
        let _io = self.context.lock_storage();
        let mut inner = self.inner.lock();
        if inner.core.is_closed() {
            return Ok(());
        }
        inner.core.force()
    }

    /// Flush and release the files; idempotent
    pub fn close(&self) -> Result<()> {
        let result = {
            let _io = self.context.lock_storage();
            let mut inner = self.inner.lock();
            if inner.core.is_closed() {
                return Ok(());
            }
            self.closed.store(true, Ordering::Release);
            inner.core.close()
        };
        self.context.cache().invalidate_prefix(&self.store_id.prefix());
        result
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().core.is_dirty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().core.is_closed()
    }

    pub fn is_corrupted(&self) -> bool {
        self.inner.lock().core.is_corrupted()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of ids assigned so far
    pub fn record_count(&self) -> Result<u32> {
        let _io = self.context.lock_storage();
        let inner = self.inner.lock();
        inner.core.ensure_usable()?;
        inner.directory.record_count(&inner.core)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    pub fn context(&self) -> &Arc<EnumContext> {
        &self.context
    }

    /// Run `f` against the directory (for inspection in tests and tooling)
    pub fn with_directory<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.inner.lock().directory)
    }
}

impl<D: KeyDescriptor, H: HashDirectory<D>> Drop for PersistentEnumerator<D, H> {
    fn drop(&mut self) {
        // An unwinding panic may have interrupted a mutation: keep the dirty stamp
        if std::thread::panicking() {
            warn!(path = %self.path.display(), "enumerator dropped during panic, left dirty");
            self.context.cache().invalidate_prefix(&self.store_id.prefix());
            return;
        }

        let _io = self.context.lock_storage();
        let inner = self.inner.get_mut();
        if inner.core.is_closed() {
            return;
        }

        warn!(path = %self.path.display(), "enumerator dropped without close");
        if let Err(e) = inner.core.close() {
            error!(path = %self.path.display(), error = %e, "failed to close enumerator on drop");
        }
        drop(_io);
        self.context.cache().invalidate_prefix(&self.store_id.prefix());
    }
}
