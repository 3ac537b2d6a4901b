//! Process-local cache used for the OAuth replay guard and small
//! short-lived lookups. String payloads only; callers serialize
//! structured values themselves.

pub mod memory;

pub use memory::MemoryCache;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache serialization error: {0}")]
    Serialization(String),
    #[error("Cache operation failed: {0}")]
    Operation(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Object-safe cache interface so services hold `Arc<dyn Cache>` and tests
/// can swap implementations.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Store the value only if the key is absent (or expired). Returns
    /// whether the value was stored; the check and the insert happen under
    /// one lock so concurrent callers cannot both succeed.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> CacheResult<bool>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn clear(&self) -> CacheResult<()>;
}

pub type CacheHandle = Arc<dyn Cache>;

pub fn new_memory_cache() -> CacheHandle {
    Arc::new(MemoryCache::new())
}
