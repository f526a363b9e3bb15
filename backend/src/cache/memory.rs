use super::CacheStore;
use crate::utils::clock::{Clock, SystemClock};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Process-local cache for development and tests.
///
/// Expiry is evaluated against the injected clock, so a test that moves the
/// clock forward sees entries disappear.
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = self.clock.now() + chrono::Duration::from_std(ttl)?;
        let mut entries = self.entries.lock().await;

        // Drop whatever has already expired so the map stays bounded.
        let now = self.clock.now();
        entries.retain(|_, entry| entry.expires_at > now);

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(key).filter(|entry| entry.expires_at > now) {
            let count = entry.value.parse::<u64>()? + 1;
            entry.value = count.to_string();
            return Ok(count);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: "1".to_string(),
                expires_at: now + chrono::Duration::from_std(ttl)?,
            },
        );
        Ok(1)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let removed = self.entries.lock().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.expires_at > now))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;

    fn store() -> (InMemoryStore, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        (InMemoryStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (store, _) = store();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_expire_with_clock() {
        let (store, clock) = store();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(59));
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_ttl() {
        let (store, clock) = store();
        store
            .set_with_ttl("k", "old", Duration::from_secs(10))
            .await
            .unwrap();
        store
            .set_with_ttl("k", "new", Duration::from_secs(120))
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_increment_counts_within_ttl() {
        let (store, clock) = store();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.increment("hits", ttl).await.unwrap(), 1);
        assert_eq!(store.increment("hits", ttl).await.unwrap(), 2);

        // Later increments do not extend the first expiry.
        clock.advance(chrono::Duration::seconds(59));
        assert_eq!(store.increment("hits", ttl).await.unwrap(), 3);
        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(store.increment("hits", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_pruned_on_write() {
        let (store, clock) = store();
        store
            .set_with_ttl("old", "v", Duration::from_secs(1))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(5));
        store
            .set_with_ttl("fresh", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.entries.lock().await.len(), 1);
    }
}
