//! Key-value cache with TTL support.
//!
//! Revocation entries, one-time codes and rate-limit counters live here
//! rather than in SQL. The
//! store is reached through [`CacheStore`] so several server instances can
//! share a Redis deployment while tests run against [`InMemoryStore`].

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

/// Minimal capability set needed by the session layer.
///
/// Implementations must offer read-your-writes: a value written by `set_with_ttl`
/// is visible to the next `get` on the same store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value, for `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Returns the live value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Adds one to the counter under `key` and returns the new value.
    ///
    /// A missing or expired counter starts at 1 and lives for `ttl`; later
    /// increments keep the original expiry.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64>;

    /// Removes `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<()>;
}
