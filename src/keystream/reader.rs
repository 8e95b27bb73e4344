//! Key Stream Reader
//!
//! Buffered `Read` adapter over a region of page storage.

use std::io::{self, Read};

use crate::error::StoreError;
use crate::storage::PageStorage;

/// Bytes fetched from storage per refill
const BUFFER_SIZE: usize = 512;

/// Reads the bytes in `[start, limit)` of a storage sequentially
pub struct StreamReader<'a> {
    storage: &'a dyn PageStorage,
    /// Storage offset of `buffer[0]`
    buffer_start: u64,
    buffer: Vec<u8>,
    /// Read position inside `buffer`
    cursor: usize,
    limit: u64,
}

impl<'a> StreamReader<'a> {
    pub fn new(storage: &'a dyn PageStorage, start: u64, limit: u64) -> Self {
        Self {
            storage,
            buffer_start: start,
            buffer: Vec::with_capacity(BUFFER_SIZE),
            cursor: 0,
            limit,
        }
    }

    /// Storage offset of the next byte to be read
    pub fn position(&self) -> u64 {
        self.buffer_start + self.cursor as u64
    }

    fn refill(&mut self) -> io::Result<()> {
        let start = self.position();
        let len = (self.limit.saturating_sub(start)).min(BUFFER_SIZE as u64) as usize;

        self.buffer_start = start;
        self.cursor = 0;
        self.buffer.resize(len, 0);
        if let Err(e) = self.storage.get(start, &mut self.buffer) {
            // Nothing valid was read; a retry starts from `start` again
            self.buffer.clear();
            return Err(match e {
                StoreError::Io(e) => e,
                other => io::Error::new(io::ErrorKind::Other, other.to_string()),
            });
        }
        Ok(())
    }
}

impl Read for StreamReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.cursor >= self.buffer.len() {
            self.refill()?;
            if self.buffer.is_empty() {
                return Ok(0);
            }
        }
        let n = out.len().min(self.buffer.len() - self.cursor);
        out[..n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}
