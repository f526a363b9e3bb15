//! Blacklist of logged-out tokens.
//!
//! Each revoked token is stored under its `jti` for exactly as long as the
//! token itself would have stayed valid, so the set never grows past the
//! population of live tokens.

use crate::cache::CacheStore;
use crate::errors::{ServiceError, ServiceResult};
use crate::utils::clock::Clock;
use crate::utils::jwt::Claims;
use std::sync::Arc;

#[derive(Clone)]
pub struct RevocationStore {
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl RevocationStore {
    pub fn new(cache: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    fn key(jti: &str) -> String {
        format!("revoked:{jti}")
    }

    /// Revokes the token described by `claims`.
    ///
    /// # Returns
    /// `false` when the token had already expired and nothing was stored
    pub async fn revoke(&self, claims: &Claims) -> ServiceResult<bool> {
        let Some(remaining) = claims.remaining_lifetime(self.clock.now()) else {
            return Ok(false);
        };
        let ttl = remaining
            .to_std()
            .map_err(|e| ServiceError::internal_error(format!("Invalid revocation TTL: {e}")))?;

        self.cache
            .set_with_ttl(&Self::key(&claims.jti), &claims.exp.to_string(), ttl)
            .await
            .map_err(|e| ServiceError::internal_error(format!("Cache error: {e}")))?;

        tracing::debug!(
            "Revoked {} token {} for user {}",
            claims.token_type,
            claims.jti,
            claims.sub
        );
        Ok(true)
    }

    pub async fn is_revoked(&self, claims: &Claims) -> ServiceResult<bool> {
        let entry = self
            .cache
            .get(&Self::key(&claims.jti))
            .await
            .map_err(|e| ServiceError::internal_error(format!("Cache error: {e}")))?;
        Ok(entry.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryStore;
    use crate::utils::clock::ManualClock;
    use crate::utils::jwt::TokenType;
    use chrono::{Duration, Utc};

    fn claims_expiring_in(clock: &ManualClock, seconds: i64) -> Claims {
        let now = clock.now();
        Claims {
            sub: "42".to_string(),
            role: None,
            token_type: TokenType::Refresh,
            jti: uuid::Uuid::now_v7().to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + seconds,
        }
    }

    fn setup() -> (RevocationStore, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let cache = Arc::new(InMemoryStore::new(Arc::new(clock.clone())));
        (RevocationStore::new(cache, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_revoked_token_is_seen_immediately() {
        let (store, clock) = setup();
        let claims = claims_expiring_in(&clock, 600);

        assert!(!store.is_revoked(&claims).await.unwrap());
        assert!(store.revoke(&claims).await.unwrap());
        assert!(store.is_revoked(&claims).await.unwrap());
    }

    #[tokio::test]
    async fn test_entry_does_not_outlive_token() {
        let (store, clock) = setup();
        let claims = claims_expiring_in(&clock, 600);
        store.revoke(&claims).await.unwrap();

        clock.advance(Duration::seconds(599));
        assert!(store.is_revoked(&claims).await.unwrap());

        clock.advance(Duration::seconds(1));
        assert!(!store.is_revoked(&claims).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_token_is_not_stored() {
        let (store, clock) = setup();
        let claims = claims_expiring_in(&clock, 10);
        clock.advance(Duration::seconds(11));

        assert!(!store.revoke(&claims).await.unwrap());
    }
}
