//! Hash Directory Module
//!
//! On-disk hash table mapping a key's hash to the chain of candidate records.
//!
//! The enumerator core only talks to the [`HashDirectory`] trait; the bucket
//! layout, growth policy and record addressing belong to the implementation.
//! [`ChainedHashDirectory`] is the default strategy.

mod chained;
mod record;

use crate::descriptor::KeyDescriptor;
use crate::enumerator::StoreCore;
use crate::error::Result;

pub use chained::ChainedHashDirectory;
pub use record::{addr_to_id, record_addr, Record, RECORD_SIZE};

/// A key prepared for lookup: the value, its encoded bytes, and its hash
pub struct KeyLookup<'a, K> {
    pub key: &'a K,
    pub encoded: &'a [u8],
    pub hash: u32,
}

/// Hooks a concrete hash table supplies to the enumerator core
///
/// Every method runs with the storage lock and the store monitor held.
pub trait HashDirectory<D: KeyDescriptor>: Send + 'static {
    /// Size of one record in bytes
    fn record_size(&self) -> usize;

    /// Lay out an empty directory in a freshly created file
    fn setup_empty_file(&mut self, core: &mut StoreCore<D>) -> Result<()>;

    /// Load directory state from a cleanly closed file
    fn load(&mut self, core: &mut StoreCore<D>) -> Result<()>;

    /// Find the id of `lookup`, appending a new record if absent and allowed
    ///
    /// Returns NULL_ID when the key is absent and `insert_if_absent` is false.
    fn enumerate_impl(
        &mut self,
        core: &mut StoreCore<D>,
        lookup: &KeyLookup<'_, D::Key>,
        insert_if_absent: bool,
    ) -> Result<u32>;

    /// Fill a record buffer for a key about to be written
    fn setup_record(&self, hash: u32, data_offset: u64, buf: &mut [u8]);

    /// Reserve the slot for the record in `buf`, returning its byte offset
    fn record_write_offset(&mut self, core: &mut StoreCore<D>, buf: &[u8]) -> Result<u64>;

    /// Data offset (or inline key value) stored for `id`
    fn index_to_addr(&self, core: &StoreCore<D>, id: u32) -> Result<u64>;

    /// Visit every allocated id; stops early when `visitor` returns false
    fn traverse_all_records(
        &self,
        core: &StoreCore<D>,
        visitor: &mut dyn FnMut(u32) -> Result<bool>,
    ) -> Result<bool>;

    /// Number of allocated records
    fn record_count(&self, core: &StoreCore<D>) -> Result<u32>;
}
