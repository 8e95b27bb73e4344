//! Configuration for enumstore
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, StoreError};

/// Environment variable overriding the enumeration cache capacity
pub const CACHE_SIZE_ENV: &str = "ENUMSTORE_CACHE_SIZE";

/// Main configuration shared by an [`EnumContext`](crate::EnumContext) and the
/// enumerators opened against it
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Entries per segment of the shared enumeration cache
    pub cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Backend for the primary file
    pub storage_backend: StorageBackend,

    /// Size of the first mapping for a fresh mapped file (in bytes)
    pub initial_size: u64,

    /// Granularity mapped files grow by (in bytes)
    pub page_size: u64,

    // -------------------------------------------------------------------------
    // Directory Configuration
    // -------------------------------------------------------------------------
    /// Bucket count of a freshly created directory (power of two)
    pub initial_buckets: u32,

    /// Average chain length that triggers a rehash
    pub max_chain_length: u32,
}

/// How the primary file is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Memory-mapped, grown in `page_size` steps
    Mapped,

    /// Positioned reads and writes through the file handle
    RandomAccess,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 8192,
            storage_backend: StorageBackend::Mapped,
            initial_size: 64 * 1024, // 64 KB
            page_size: 4096,
            initial_buckets: 1024,
            max_chain_length: 2,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default config with deployment overrides read from the environment
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        if let Ok(raw) = std::env::var(CACHE_SIZE_ENV) {
            config.cache_capacity = raw.trim().parse().map_err(|_| {
                StoreError::Config(format!("{} must be a positive integer, got {:?}", CACHE_SIZE_ENV, raw))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints the on-disk layout depends on
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(StoreError::Config("cache_capacity must be non-zero".to_string()));
        }
        if !self.initial_buckets.is_power_of_two() || self.initial_buckets < 16 {
            return Err(StoreError::Config(format!(
                "initial_buckets must be a power of two >= 16, got {}",
                self.initial_buckets
            )));
        }
        if self.max_chain_length == 0 {
            return Err(StoreError::Config("max_chain_length must be non-zero".to_string()));
        }
        if self.page_size == 0 {
            return Err(StoreError::Config("page_size must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the per-segment cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the primary storage backend
    pub fn storage_backend(mut self, backend: StorageBackend) -> Self {
        self.config.storage_backend = backend;
        self
    }

    /// Set the initial mapping size (in bytes)
    pub fn initial_size(mut self, size: u64) -> Self {
        self.config.initial_size = size;
        self
    }

    /// Set the mapping growth granularity (in bytes)
    pub fn page_size(mut self, size: u64) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the bucket count of fresh directories
    pub fn initial_buckets(mut self, count: u32) -> Self {
        self.config.initial_buckets = count;
        self
    }

    /// Set the average chain length that triggers a rehash
    pub fn max_chain_length(mut self, length: u32) -> Self {
        self.config.max_chain_length = length;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
