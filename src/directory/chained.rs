//! Chained Hash Directory
//!
//! Power-of-two bucket table whose heads point at singly linked chains of
//! records.
//!
//! ## Primary File Layout
//! ```text
//! ┌──────────────┬───────────────────┬─────────────────────────┬──────────────────┐
//! │ Header (8)   │ Slot 0: superblock│ Records 1..=capacity    │ Bucket table     │
//! │ magic | count│ buckets | capacity│ (16 bytes each)         │ (u32 per bucket) │
//! │              │ | table offset    │                         │                  │
//! └──────────────┴───────────────────┴─────────────────────────┴──────────────────┘
//! ```
//! The record area is reserved up front for `capacity` records, so records
//! keep their address forever. When the record count reaches `capacity`
//! (average chain length above `max_chain_length`), both the bucket count
//! and the capacity double: a new, zeroed table is laid out past the old one
//! and every record is relinked into it. The old table becomes record space.

use tracing::debug;

use crate::config::Config;
use crate::descriptor::KeyDescriptor;
use crate::enumerator::{StoreCore, NULL_ID};
use crate::error::{Result, StoreError};
use crate::storage::PageStorage;

use super::record::{addr_to_id, record_addr, Record, HASH_OFFSET, NEXT_OFFSET, RECORD_SIZE};
use super::{HashDirectory, KeyLookup};

/// Superblock field offsets inside slot 0
const SB_BUCKETS: u64 = 0;
const SB_CAPACITY: u64 = 4;
const SB_TABLE: u64 = 8;

/// Zero-fill chunk used when laying out a bucket table
const ZERO_CHUNK: usize = 64 * 1024;

/// Default [`HashDirectory`]: separate chaining over a relocatable bucket table
#[derive(Debug, Clone)]
pub struct ChainedHashDirectory {
    /// Bucket count for a fresh file
    initial_buckets: u32,
    /// Records per bucket before a rehash, fixed at creation
    max_chain_length: u32,

    // Loaded from the superblock
    bucket_count: u32,
    capacity: u32,
    table_offset: u64,
}

impl ChainedHashDirectory {
    pub fn new(initial_buckets: u32, max_chain_length: u32) -> Self {
        Self {
            initial_buckets,
            max_chain_length,
            bucket_count: 0,
            capacity: 0,
            table_offset: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.initial_buckets, config.max_chain_length)
    }

    /// Current number of buckets
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Records that fit before the next rehash
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    fn bucket_slot(&self, hash: u32) -> u64 {
        self.table_offset + (hash & (self.bucket_count - 1)) as u64 * 4
    }

    fn table_offset_for(capacity: u32) -> Result<u64> {
        let past_last = capacity
            .checked_add(1)
            .ok_or_else(|| StoreError::Unsupported("directory capacity overflow".to_string()))?;
        Ok(record_addr(past_last))
    }

    fn write_superblock<D: KeyDescriptor>(&self, core: &mut StoreCore<D>) -> Result<()> {
        let base = record_addr(NULL_ID);
        let storage = core.storage_mut()?;
        storage.put_int(base + SB_BUCKETS, self.bucket_count)?;
        storage.put_int(base + SB_CAPACITY, self.capacity)?;
        storage.put_long(base + SB_TABLE, self.table_offset)?;
        Ok(())
    }

    fn zero_table<D: KeyDescriptor>(core: &mut StoreCore<D>, offset: u64, buckets: u32) -> Result<()> {
        let storage = core.storage_mut()?;
        let zeros = vec![0u8; ZERO_CHUNK];
        let end = offset + buckets as u64 * 4;
        let mut pos = offset;
        while pos < end {
            let n = ((end - pos) as usize).min(ZERO_CHUNK);
            storage.put(pos, &zeros[..n])?;
            pos += n as u64;
        }
        Ok(())
    }

    /// Double the bucket table and relink every record into it
    fn rehash<D: KeyDescriptor>(&mut self, core: &mut StoreCore<D>) -> Result<()> {
        let count = core.meta_data()?;
        let overflow = || StoreError::Unsupported("directory cannot grow past u32 ids".to_string());
        let new_buckets = self.bucket_count.checked_mul(2).ok_or_else(overflow)?;
        let new_capacity = self.capacity.checked_mul(2).ok_or_else(overflow)?;
        let new_table = Self::table_offset_for(new_capacity)?;

        Self::zero_table(core, new_table, new_buckets)?;

        let mask = new_buckets - 1;
        for id in 1..=count {
            let addr = record_addr(id);
            let hash = core.storage().get_int(addr + HASH_OFFSET)?;
            let slot = new_table + (hash & mask) as u64 * 4;
            let head = core.storage().get_int(slot)?;

            let storage = core.storage_mut()?;
            storage.put_int(addr + NEXT_OFFSET, head)?;
            storage.put_int(slot, id)?;
        }

        self.bucket_count = new_buckets;
        self.capacity = new_capacity;
        self.table_offset = new_table;
        self.write_superblock(core)?;

        debug!(
            path = %core.path().display(),
            records = count,
            buckets = new_buckets,
            capacity = new_capacity,
            "rehashed directory"
        );
        Ok(())
    }
}

impl<D: KeyDescriptor> HashDirectory<D> for ChainedHashDirectory {
    fn record_size(&self) -> usize {
        RECORD_SIZE
    }

    fn setup_empty_file(&mut self, core: &mut StoreCore<D>) -> Result<()> {
        self.bucket_count = self.initial_buckets;
        self.capacity = self
            .initial_buckets
            .checked_mul(self.max_chain_length)
            .ok_or_else(|| StoreError::Config("initial_buckets * max_chain_length overflows".to_string()))?;
        self.table_offset = Self::table_offset_for(self.capacity)?;

        Self::zero_table(core, self.table_offset, self.bucket_count)?;
        self.write_superblock(core)
    }

    fn load(&mut self, core: &mut StoreCore<D>) -> Result<()> {
        let base = record_addr(NULL_ID);
        let storage = core.storage();
        let bucket_count = storage.get_int(base + SB_BUCKETS)?;
        let capacity = storage.get_int(base + SB_CAPACITY)?;
        let table_offset = storage.get_long(base + SB_TABLE)?;
        let count = core.meta_data()?;

        if !bucket_count.is_power_of_two() {
            return Err(core.corruption(format!("bucket count {} is not a power of two", bucket_count)));
        }
        if count > capacity || table_offset != Self::table_offset_for(capacity)? {
            return Err(core.corruption(format!(
                "inconsistent superblock: count={} capacity={} table={}",
                count, capacity, table_offset
            )));
        }
        if table_offset + bucket_count as u64 * 4 > core.storage().length() {
            return Err(core.corruption("bucket table extends past end of file"));
        }

        self.bucket_count = bucket_count;
        self.capacity = capacity;
        self.table_offset = table_offset;
        Ok(())
    }

    fn enumerate_impl(
        &mut self,
        core: &mut StoreCore<D>,
        lookup: &KeyLookup<'_, D::Key>,
        insert_if_absent: bool,
    ) -> Result<u32> {
        let count = core.meta_data()?;
        let mut id = core.storage().get_int(self.bucket_slot(lookup.hash))?;
        let mut steps = 0u32;

        while id != NULL_ID {
            if id > count {
                return Err(core.corruption(format!("chain pointer {} beyond record count {}", id, count)));
            }
            steps += 1;
            if steps > count {
                return Err(core.corruption("cycle in bucket chain"));
            }

            let record = Record::read(core.storage(), id)?;
            if record.hash == lookup.hash && core.key_matches(lookup.key, record.data_offset)? {
                return Ok(id);
            }
            id = record.next;
        }

        if !insert_if_absent {
            return Ok(NULL_ID);
        }

        if count >= self.capacity {
            self.rehash(core)?;
        }

        let addr = core.write_data(self, lookup)?;
        let id = addr_to_id(addr);

        // Link at the head of the bucket chain
        let slot = self.bucket_slot(lookup.hash);
        let head = core.storage().get_int(slot)?;
        let storage = core.storage_mut()?;
        storage.put_int(addr + NEXT_OFFSET, head)?;
        storage.put_int(slot, id)?;

        Ok(id)
    }

    fn setup_record(&self, hash: u32, data_offset: u64, buf: &mut [u8]) {
        Record::new(hash, data_offset).encode(buf);
    }

    fn record_write_offset(&mut self, core: &mut StoreCore<D>, _buf: &[u8]) -> Result<u64> {
        let id = core.meta_data()? + 1;
        if id > self.capacity {
            return Err(core.corruption(format!("record {} past reserved capacity {}", id, self.capacity)));
        }
        core.put_meta_data(id)?;
        Ok(record_addr(id))
    }

    fn index_to_addr(&self, core: &StoreCore<D>, id: u32) -> Result<u64> {
        if id == NULL_ID || id > core.meta_data()? {
            return Err(StoreError::InvalidId(id));
        }
        Ok(Record::read(core.storage(), id)?.data_offset)
    }

    fn traverse_all_records(
        &self,
        core: &StoreCore<D>,
        visitor: &mut dyn FnMut(u32) -> Result<bool>,
    ) -> Result<bool> {
        let count = core.meta_data()?;
        for id in 1..=count {
            if !visitor(id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn record_count(&self, core: &StoreCore<D>) -> Result<u32> {
        core.meta_data()
    }
}
