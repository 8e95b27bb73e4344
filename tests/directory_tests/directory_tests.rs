//! Tests for the chained hash directory
//!
//! These tests verify:
//! - Record encoding and addressing
//! - Superblock layout of a fresh file
//! - Rehash: ids stay stable while buckets and capacity double
//! - Full hash collisions resolved by key equality
//! - Detection of broken chains and superblocks

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use enumstore::directory::{addr_to_id, record_addr, Record, RECORD_SIZE};
use enumstore::enumerator::DATA_START;
use enumstore::{
    Config, EnumContext, KeyDescriptor, PersistentEnumerator, StoreError, StringDescriptor, NULL_ID,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("directory.db");
    (temp_dir, path)
}

fn small_config(max_chain_length: u32) -> Config {
    Config::builder()
        .initial_buckets(16)
        .max_chain_length(max_chain_length)
        .initial_size(4096)
        .build()
}

fn open_strings(path: &Path, config: &Config) -> PersistentEnumerator<StringDescriptor> {
    let context = Arc::new(EnumContext::from_config(config));
    PersistentEnumerator::open(path, StringDescriptor::new(), config, context).unwrap()
}

fn key(i: u32) -> String {
    format!("key-{}", i)
}

/// Overwrite raw bytes of a closed primary file
fn patch_file(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

/// String keys that all land in the same bucket
struct CollidingDescriptor(StringDescriptor);

impl KeyDescriptor for CollidingDescriptor {
    type Key = String;

    fn encode(&self, key: &String, out: &mut Vec<u8>) -> enumstore::Result<()> {
        self.0.encode(key, out)
    }

    fn decode(&self, input: &mut dyn std::io::Read, limit: u64) -> enumstore::Result<String> {
        self.0.decode(input, limit)
    }

    fn hash_code(&self, _encoded: &[u8]) -> u32 {
        7
    }
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_record_layout() {
    let mut record = Record::new(0xDEAD_BEEF, 1 << 40);
    record.next = 7;

    let mut buf = [0u8; RECORD_SIZE];
    record.encode(&mut buf);

    assert_eq!(&buf[0..4], &0xDEAD_BEEFu32.to_le_bytes());
    assert_eq!(&buf[4..8], &7u32.to_le_bytes());
    assert_eq!(&buf[8..16], &(1u64 << 40).to_le_bytes());
    assert_eq!(Record::decode(&buf), record);
}

#[test]
fn test_record_addressing() {
    assert_eq!(record_addr(NULL_ID), DATA_START);
    assert_eq!(record_addr(3), DATA_START + 3 * RECORD_SIZE as u64);
    assert_eq!(addr_to_id(record_addr(12_345)), 12_345);
}

#[test]
fn test_fresh_directory_geometry() {
    let (_temp, path) = setup_temp_dir();
    let store = open_strings(&path, &small_config(2));

    let (buckets, capacity) = store.with_directory(|d| (d.bucket_count(), d.capacity()));

    assert_eq!(buckets, 16);
    assert_eq!(capacity, 32);
    assert_eq!(store.record_count().unwrap(), 0);
    store.close().unwrap();
}

#[test]
fn test_geometry_survives_reopen() {
    let (_temp, path) = setup_temp_dir();
    let config = small_config(2);
    {
        let store = open_strings(&path, &config);
        store.enumerate(&key(1)).unwrap();
        store.close().unwrap();
    }

    // A different config does not override what the file says
    let other = Config::builder().initial_buckets(64).max_chain_length(4).build();
    let store = open_strings(&path, &other);

    assert_eq!(store.with_directory(|d| (d.bucket_count(), d.capacity())), (16, 32));
    store.close().unwrap();
}

// =============================================================================
// Rehash Tests
// =============================================================================

#[test]
fn test_rehash_keeps_ids_stable() {
    let (_temp, path) = setup_temp_dir();
    let store = open_strings(&path, &small_config(1));

    for i in 1..=1000 {
        assert_eq!(store.enumerate(&key(i)).unwrap(), i);
    }

    let (buckets, capacity) = store.with_directory(|d| (d.bucket_count(), d.capacity()));
    assert_eq!(buckets, 1024);
    assert_eq!(capacity, 1024);

    // Bypass the cache so lookups walk the relinked chains
    store.context().clear_cache();
    for i in 1..=1000 {
        assert_eq!(store.try_enumerate(&key(i)).unwrap(), i, "lookup of {}", key(i));
        assert_eq!(store.value_of(i).unwrap(), key(i));
    }
    assert_eq!(store.try_enumerate(&key(1001)).unwrap(), NULL_ID);
    store.close().unwrap();
}

#[test]
fn test_rehash_triggers_at_capacity() {
    let (_temp, path) = setup_temp_dir();
    let store = open_strings(&path, &small_config(2));

    for i in 1..=32 {
        store.enumerate(&key(i)).unwrap();
    }
    assert_eq!(store.with_directory(|d| d.bucket_count()), 16);

    store.enumerate(&key(33)).unwrap();
    assert_eq!(store.with_directory(|d| (d.bucket_count(), d.capacity())), (32, 64));
    store.close().unwrap();
}

#[test]
fn test_rehashed_file_reopens() {
    let (_temp, path) = setup_temp_dir();
    let config = small_config(1);
    {
        let store = open_strings(&path, &config);
        for i in 1..=300 {
            store.enumerate(&key(i)).unwrap();
        }
        store.close().unwrap();
    }

    let store = open_strings(&path, &config);
    assert_eq!(store.record_count().unwrap(), 300);
    for i in (1..=300).rev() {
        assert_eq!(store.try_enumerate(&key(i)).unwrap(), i);
    }

    // Keeps growing after reopen
    for i in 301..=700 {
        assert_eq!(store.enumerate(&key(i)).unwrap(), i);
    }
    assert_eq!(store.with_directory(|d| d.bucket_count()), 1024);
    store.close().unwrap();
}

// =============================================================================
// Collision Tests
// =============================================================================

#[test]
fn test_full_hash_collisions_resolve_by_key() {
    let (_temp, path) = setup_temp_dir();
    let config = small_config(2);
    let context = Arc::new(EnumContext::from_config(&config));
    let store = PersistentEnumerator::open(
        &path,
        CollidingDescriptor(StringDescriptor::new()),
        &config,
        Arc::clone(&context),
    )
    .unwrap();

    for i in 1..=100 {
        assert_eq!(store.enumerate(&key(i)).unwrap(), i);
    }

    context.clear_cache();
    for i in 1..=100 {
        assert_eq!(store.enumerate(&key(i)).unwrap(), i);
    }
    assert_eq!(store.record_count().unwrap(), 100);
    assert_eq!(store.try_enumerate(&"absent".to_string()).unwrap(), NULL_ID);
    store.close().unwrap();
}

// =============================================================================
// Corruption Detection
// =============================================================================

#[test]
fn test_dangling_chain_pointer_marks_corrupted() {
    let (_temp, path) = setup_temp_dir();
    let config = small_config(2);
    let (buckets, capacity) = {
        let store = open_strings(&path, &config);
        store.enumerate(&key(1)).unwrap();
        let geometry = store.with_directory(|d| (d.bucket_count(), d.capacity()));
        store.close().unwrap();
        geometry
    };

    // Point every bucket at a record that was never written
    let table = record_addr(capacity + 1);
    let bogus: Vec<u8> = (0..buckets).flat_map(|_| 999u32.to_le_bytes()).collect();
    patch_file(&path, table, &bogus);

    let store = open_strings(&path, &config);
    let result = store.try_enumerate(&key(2));

    assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    assert!(store.is_corrupted());
    assert!(matches!(store.enumerate(&key(3)), Err(StoreError::Corrupted { .. })));
    store.close().unwrap();

    // The dirty stamp left behind refuses the next open
    let context = Arc::new(EnumContext::from_config(&config));
    let reopened = PersistentEnumerator::open(&path, StringDescriptor::new(), &config, context);
    assert!(matches!(reopened, Err(StoreError::Corrupted { .. })));
}

#[test]
fn test_inconsistent_superblock_refused() {
    let (_temp, path) = setup_temp_dir();
    let config = small_config(2);
    {
        let store = open_strings(&path, &config);
        store.enumerate(&key(1)).unwrap();
        store.close().unwrap();
    }

    // Bucket count in slot 0 that is not a power of two
    patch_file(&path, record_addr(NULL_ID), &17u32.to_le_bytes());

    let context = Arc::new(EnumContext::from_config(&config));
    let result = PersistentEnumerator::open(&path, StringDescriptor::new(), &config, context);

    assert!(matches!(result, Err(StoreError::Corrupted { .. })));
}
