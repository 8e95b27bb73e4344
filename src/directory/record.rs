//! Record layout
//!
//! Fixed-size records addressed by id.
//!
//! ```text
//! addr(id) = DATA_START + id * RECORD_SIZE
//! ┌────────────┬────────────┬────────────────────┐
//! │ hash (4)   │ next (4)   │ data offset (8)    │
//! └────────────┴────────────┴────────────────────┘
//! ```
//! `next` is the id of the following record in the same bucket chain
//! (NULL_ID ends the chain). `data offset` is the key stream offset, or the
//! key itself for inline keys.

use crate::enumerator::DATA_START;
use crate::error::Result;
use crate::storage::PageStorage;

/// Size of one record in bytes
pub const RECORD_SIZE: usize = 16;

pub(crate) const HASH_OFFSET: u64 = 0;
pub(crate) const NEXT_OFFSET: u64 = 4;

/// Byte address of the record slot for `id`
#[inline]
pub fn record_addr(id: u32) -> u64 {
    DATA_START + id as u64 * RECORD_SIZE as u64
}

/// Inverse of [`record_addr`]
#[inline]
pub fn addr_to_id(addr: u64) -> u32 {
    ((addr - DATA_START) / RECORD_SIZE as u64) as u32
}

/// Decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub hash: u32,
    pub next: u32,
    pub data_offset: u64,
}

impl Record {
    pub fn new(hash: u32, data_offset: u64) -> Self {
        Self {
            hash,
            next: 0,
            data_offset,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.hash.to_le_bytes());
        buf[4..8].copy_from_slice(&self.next.to_le_bytes());
        buf[8..16].copy_from_slice(&self.data_offset.to_le_bytes());
    }

    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        Self {
            hash: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            next: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            data_offset: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
        }
    }

    /// Read the record stored for `id`
    pub fn read(storage: &dyn PageStorage, id: u32) -> Result<Self> {
        let mut buf = [0u8; RECORD_SIZE];
        storage.get(record_addr(id), &mut buf)?;
        Ok(Self::decode(&buf))
    }
}
