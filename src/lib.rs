//! # enumstore
//!
//! A persistent enumerator: a durable store that assigns a stable, dense,
//! non-negative `u32` id to every distinct key it has ever seen, and maps
//! ids back to keys. Built for interning large key sets (paths, tokens,
//! strings) into compact ids for secondary indexes.
//!
//! - On-disk chained hash directory with automatic rehash
//! - Append-only key stream, or inline integer keys
//! - Shared segmented-LRU enumeration cache
//! - Dirty/clean header stamping with corruption detection on open
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 PersistentEnumerator                         │
//! │     enumerate / try_enumerate / value_of / traversal         │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌──────────────────┐
//!   │ EnumContext     │               │   StoreCore      │
//!   │ storage lock    │               │ header, flags,   │
//!   │ SLRU cache      │               │ flush / close    │
//!   └─────────────────┘               └────────┬─────────┘
//!                                              │
//!                          ┌───────────────────┼───────────────────┐
//!                          ▼                   ▼                   ▼
//!                 ┌────────────────┐  ┌────────────────┐  ┌────────────────┐
//!                 │ HashDirectory  │  │  PageStorage   │  │   KeyStream    │
//!                 │ (chained)      │  │ (mmap / file)  │  │  (.keystream)  │
//!                 └────────────────┘  └────────────────┘  └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use enumstore::{Config, EnumContext, PersistentEnumerator, StringDescriptor};
//!
//! # fn main() -> enumstore::Result<()> {
//! let config = Config::default();
//! let context = Arc::new(EnumContext::from_config(&config));
//! let names = PersistentEnumerator::open("names.db", StringDescriptor::new(), &config, context)?;
//!
//! let id = names.enumerate(&"foo".to_string())?;
//! assert_eq!(names.value_of(id)?, "foo");
//! names.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod keystream;
pub mod descriptor;
pub mod directory;
pub mod cache;
pub mod context;
pub mod enumerator;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{Config, StorageBackend};
pub use context::{EnumContext, StoreId};
pub use descriptor::{
    BincodeDescriptor, InlineIntDescriptor, InlineKeyDescriptor, KeyDescriptor, StringDescriptor,
};
pub use directory::{ChainedHashDirectory, HashDirectory};
pub use enumerator::{inspect_header, HeaderStatus, PersistentEnumerator, NULL_ID};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of enumstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
