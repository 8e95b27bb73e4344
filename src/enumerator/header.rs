//! Primary file header
//!
//! ```text
//! ┌─────────────────────┬──────────────────────┐
//! │ status magic (4)    │ metadata slot (4)    │  records / directory ...
//! └─────────────────────┴──────────────────────┘
//! 0                     4                      8 = DATA_START
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::Result;

/// Id meaning "no such key"; never assigned
pub const NULL_ID: u32 = 0;

/// On-disk format version, folded into the clean magic
pub const FORMAT_VERSION: u32 = 5;

/// Stamped before the first mutation after open or flush
pub const DIRTY_MAGIC: u32 = 0xBABE_0589;

/// Stamped by a successful flush of a non-corrupted store
pub const CLEAN_MAGIC: u32 = 0xEBAB_AFAC_u32.wrapping_add(FORMAT_VERSION);

pub const STATUS_OFFSET: u64 = 0;
pub const META_DATA_OFFSET: u64 = 4;

/// First byte owned by the hash directory
pub const DATA_START: u64 = 8;

/// What the status magic of a primary file says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// No file at the path
    Missing,
    /// File exists but holds no header yet
    Empty,
    /// Correctly closed; opens normally
    Clean,
    /// Left dirty by a crash or a corruption mark
    Dirty,
    /// Not an enumerator file, or another format version
    Unknown(u32),
}

impl HeaderStatus {
    pub fn from_magic(magic: u32) -> Self {
        match magic {
            CLEAN_MAGIC => HeaderStatus::Clean,
            DIRTY_MAGIC => HeaderStatus::Dirty,
            other => HeaderStatus::Unknown(other),
        }
    }
}

/// Read the status magic of `path` without opening it as a store
pub fn inspect_header(path: &Path) -> Result<HeaderStatus> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HeaderStatus::Missing),
        Err(e) => return Err(e.into()),
    };

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(HeaderStatus::from_magic(u32::from_le_bytes(magic))),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(HeaderStatus::Empty),
        Err(e) => Err(e.into()),
    }
}
