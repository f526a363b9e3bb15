//! One-time codes for password recovery and email verification.
//!
//! A code is bound to a (purpose, email) pair, lives for a short TTL and
//! tolerates a fixed number of verification attempts. The attempt counter is
//! written back before the code is compared, so an interrupted request still
//! counts against the limit.

use crate::cache::CacheStore;
use crate::errors::{AuthError, ServiceError, ServiceResult};
use crate::utils::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const OTP_DIGITS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    PasswordReset,
    EmailVerification,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::PasswordReset => "reset",
            OtpPurpose::EmailVerification => "verify_email",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
    attempt_count: u32,
}

#[derive(Clone)]
pub struct OtpManager {
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpManager {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        ttl_seconds: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            cache,
            clock,
            ttl: Duration::seconds(ttl_seconds as i64),
            max_attempts,
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl.num_minutes().max(1)
    }

    fn key(purpose: OtpPurpose, email: &str) -> String {
        format!("otp:{}:{}", purpose, email.trim().to_lowercase())
    }

    /// Creates a fresh code for (purpose, email), replacing any pending one.
    pub async fn generate(&self, purpose: OtpPurpose, email: &str) -> ServiceResult<String> {
        let code = format!("{:0width$}", OsRng.gen_range(0..1_000_000u32), width = OTP_DIGITS);
        let entry = OtpEntry {
            code: code.clone(),
            expires_at: self.clock.now() + self.ttl,
            attempt_count: 0,
        };

        self.store(&Self::key(purpose, email), &entry, self.ttl).await?;
        tracing::info!("Generated {} code for {}", purpose, email);
        Ok(code)
    }

    /// Checks `code` against the pending entry for (purpose, email).
    ///
    /// # Errors
    /// - `OtpExpired` when no live entry exists
    /// - `RateLimited` once the attempt limit is used up, even for the right code
    /// - `InvalidOtp` on a mismatch with attempts left
    pub async fn verify(&self, purpose: OtpPurpose, email: &str, code: &str) -> ServiceResult<()> {
        let key = Self::key(purpose, email);
        let now = self.clock.now();

        let Some(raw) = self.cache.get(&key).await.map_err(cache_error)? else {
            return Err(AuthError::OtpExpired.into());
        };

        let mut entry: OtpEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Discarding unreadable {} entry for {}: {}", purpose, email, e);
                self.cache.delete(&key).await.map_err(cache_error)?;
                return Err(AuthError::OtpExpired.into());
            }
        };

        let remaining = entry.expires_at - now;
        if remaining <= Duration::zero() {
            self.cache.delete(&key).await.map_err(cache_error)?;
            return Err(AuthError::OtpExpired.into());
        }

        entry.attempt_count += 1;
        if entry.attempt_count > self.max_attempts {
            self.cache.delete(&key).await.map_err(cache_error)?;
            tracing::warn!("Attempt limit exceeded for {} code of {}", purpose, email);
            return Err(AuthError::RateLimited.into());
        }
        self.store(&key, &entry, remaining).await?;

        if constant_time_eq(entry.code.as_bytes(), code.trim().as_bytes()) {
            self.cache.delete(&key).await.map_err(cache_error)?;
            return Ok(());
        }

        if entry.attempt_count >= self.max_attempts {
            tracing::warn!("Last attempt used for {} code of {}", purpose, email);
            Err(AuthError::RateLimited.into())
        } else {
            Err(AuthError::InvalidOtp.into())
        }
    }

    async fn store(&self, key: &str, entry: &OtpEntry, ttl: Duration) -> ServiceResult<()> {
        let raw = serde_json::to_string(entry)
            .map_err(|e| ServiceError::internal_error(format!("OTP serialize error: {e}")))?;
        let ttl = ttl
            .to_std()
            .map_err(|e| ServiceError::internal_error(format!("Invalid OTP TTL: {e}")))?;
        self.cache
            .set_with_ttl(key, &raw, ttl)
            .await
            .map_err(cache_error)
    }
}

fn cache_error(e: anyhow::Error) -> ServiceError {
    ServiceError::internal_error(format!("Cache error: {e}"))
}

/// Byte comparison whose running time does not depend on where inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
