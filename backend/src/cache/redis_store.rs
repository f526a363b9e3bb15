use super::CacheStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::time::Duration;

/// Redis-backed cache for production use.
///
/// Requires a Redis connection URL (e.g., `redis://127.0.0.1:6379`). Keys are
/// written with `SET .. EX` so Redis removes them on expiry.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Create a new Redis store from a connection URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid REDIS_URL")?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Redis connection error")?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        // Redis rejects an EX of zero.
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .context("Redis SETEX error")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.context("Redis GET error")?;
        Ok(value)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = conn.incr(key, 1u64).await.context("Redis INCR error")?;
        if count == 1 {
            let seconds = ttl.as_secs().max(1) as i64;
            let _: bool = conn
                .expire(key, seconds)
                .await
                .context("Redis EXPIRE error")?;
        }
        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let count: i64 = conn.del(key).await.context("Redis DEL error")?;
        Ok(count > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING error")?;
        Ok(())
    }
}
