//! Shared application state handed to every handler and middleware.
//!
//! Built once at startup from the immutable [`Config`]; cloning is cheap.

use crate::cache::{CacheStore, InMemoryStore, RedisStore};
use crate::config::Config;
use crate::database::Database;
use crate::services::email_service::{EmailService, Mailer};
use crate::services::otp_service::OtpManager;
use crate::services::rate_limit_service::RateLimiter;
use crate::services::revocation_service::RevocationStore;
use crate::services::token_service::TokenService;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::jwt::JwtUtils;
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub cache: Arc<dyn CacheStore>,
    pub tokens: TokenService,
    pub otp: OtpManager,
    pub rate_limiter: RateLimiter,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub clock: Arc<dyn Clock>,
    /// Hash verified against when the email is unknown, so a failed login
    /// costs the same whether or not the account exists.
    dummy_hash: Arc<str>,
}

impl AppState {
    /// Connects the database, cache and mail relay described by `config`.
    pub async fn initialize(config: Config) -> Result<Self> {
        let db = Database::new(&config).await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let cache: Arc<dyn CacheStore> = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                info!("Using Redis for sessions and one-time codes");
                Arc::new(store)
            }
            None => {
                warn!(
                    "REDIS_URL not set. Falling back to an in-memory store; revocations and codes will not be shared between instances."
                );
                Arc::new(InMemoryStore::new(clock.clone()))
            }
        };

        let mailer: Option<Arc<dyn Mailer>> = match config.email_config() {
            Some(email_config) => match EmailService::new(email_config) {
                Ok(service) => {
                    info!("Email service initialized successfully");
                    Some(Arc::new(service))
                }
                Err(e) => {
                    warn!(
                        "Failed to initialize email service: {}. One-time codes will not be mailed.",
                        e
                    );
                    None
                }
            },
            None => {
                warn!("Email configuration not found. One-time codes will not be mailed.");
                None
            }
        };

        Self::new(db.pool, config, cache, mailer, clock)
    }

    pub fn new(
        pool: SqlitePool,
        config: Config,
        cache: Arc<dyn CacheStore>,
        mailer: Option<Arc<dyn Mailer>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let jwt = JwtUtils::new(&config, clock.clone());
        let tokens = TokenService::new(jwt, RevocationStore::new(cache.clone(), clock.clone()));
        let otp = OtpManager::new(
            cache.clone(),
            clock.clone(),
            config.otp_ttl_seconds,
            config.otp_max_attempts,
        );
        let rate_limiter = RateLimiter::new(
            cache.clone(),
            clock.clone(),
            config.rate_limit_requests,
            config.rate_limit_window_seconds,
        );
        let dummy_hash = bcrypt::hash("timing-equalizer-password", config.bcrypt_cost)
            .context("Failed to prepare password hasher")?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            cache,
            tokens,
            otp,
            rate_limiter,
            mailer,
            clock,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::database::test_pool;
    use crate::services::email_service::RecordingMailer;
    use crate::utils::clock::ManualClock;
    use crate::utils::jwt::tests::test_config;
    use chrono::Utc;

    pub struct TestContext {
        pub state: AppState,
        pub clock: ManualClock,
        pub mailer: Arc<RecordingMailer>,
    }

    pub async fn test_state() -> TestContext {
        test_state_with_mailer(RecordingMailer::default()).await
    }

    pub async fn test_state_with_mailer(mailer: RecordingMailer) -> TestContext {
        test_state_with(test_config(), mailer).await
    }

    pub async fn test_state_with(config: Config, mailer: RecordingMailer) -> TestContext {
        let clock = ManualClock::new(Utc::now());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let cache: Arc<dyn CacheStore> = Arc::new(InMemoryStore::new(shared.clone()));
        let mailer = Arc::new(mailer);

        let state = AppState::new(
            test_pool().await,
            config,
            cache,
            Some(mailer.clone() as Arc<dyn Mailer>),
            shared,
        )
        .unwrap();

        TestContext {
            state,
            clock,
            mailer,
        }
    }
}
