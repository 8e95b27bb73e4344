//! Key Descriptors
//!
//! How keys are hashed, serialized into the key stream, and read back.
//!
//! Two flavours exist:
//! - stream keys: encoded with bincode and appended to the key stream; the
//!   record stores the payload's offset
//! - inline keys: small integers stored directly in the record's data field,
//!   no key stream at all

use std::io::Read;
use std::marker::PhantomData;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Serializer contract for the keys of one enumerator
///
/// `encode` output is also the cache identity of a key, so equal keys must
/// encode to equal bytes.
pub trait KeyDescriptor: Send + Sync + 'static {
    type Key: Clone + Eq + Send + Sync;

    /// Append the serialized form of `key` to `out`
    fn encode(&self, key: &Self::Key, out: &mut Vec<u8>) -> Result<()>;

    /// Read exactly one key; never consumes more than `limit` bytes
    fn decode(&self, input: &mut dyn Read, limit: u64) -> Result<Self::Key>;

    /// Hash persisted in the key's record. Must be stable across processes.
    fn hash_code(&self, encoded: &[u8]) -> u32 {
        crc32fast::hash(encoded)
    }

    /// `Some` when keys are stored inline as integers
    fn inline(&self) -> Option<&dyn InlineKeyDescriptor<Self::Key>> {
        None
    }
}

/// Keys that map one-to-one onto a `u32`
pub trait InlineKeyDescriptor<K>: Send + Sync {
    fn to_int(&self, key: &K) -> u32;

    fn from_int(&self, value: u32) -> K;
}

// =============================================================================
// Bincode Descriptor
// =============================================================================

/// Descriptor for any serde type, length-prefixed by bincode's fixint encoding
pub struct BincodeDescriptor<K> {
    _key: PhantomData<fn() -> K>,
}

/// Descriptor for `String` keys
pub type StringDescriptor = BincodeDescriptor<String>;

impl<K> BincodeDescriptor<K> {
    pub fn new() -> Self {
        Self { _key: PhantomData }
    }
}

impl<K> Default for BincodeDescriptor<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyDescriptor for BincodeDescriptor<K>
where
    K: Serialize + DeserializeOwned + Clone + Eq + Send + Sync + 'static,
{
    type Key = K;

    fn encode(&self, key: &K, out: &mut Vec<u8>) -> Result<()> {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .serialize_into(out, key)?;
        Ok(())
    }

    fn decode(&self, input: &mut dyn Read, limit: u64) -> Result<K> {
        // The limit keeps a corrupted length prefix from allocating wildly
        let key = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(limit)
            .deserialize_from(input)?;
        Ok(key)
    }
}

// =============================================================================
// Inline Integer Descriptor
// =============================================================================

/// Descriptor for `u32` keys stored inline in their records
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineIntDescriptor;

impl KeyDescriptor for InlineIntDescriptor {
    type Key = u32;

    fn encode(&self, key: &u32, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&key.to_le_bytes());
        Ok(())
    }

    fn decode(&self, input: &mut dyn Read, _limit: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        input
            .read_exact(&mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(u32::from_le_bytes(buf))
    }

    fn hash_code(&self, encoded: &[u8]) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&encoded[..4]);
        u32::from_le_bytes(buf)
    }

    fn inline(&self) -> Option<&dyn InlineKeyDescriptor<u32>> {
        Some(self)
    }
}

impl InlineKeyDescriptor<u32> for InlineIntDescriptor {
    fn to_int(&self, key: &u32) -> u32 {
        *key
    }

    fn from_int(&self, value: u32) -> u32 {
        value
    }
}
