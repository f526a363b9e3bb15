//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the database URL, server port, token signing secret, token and OTP
//! lifetimes, the request rate limit, the cache endpoint and the optional
//! SMTP relay.
//!
//! Configuration is read once at startup and shared as an immutable value.

use anyhow::{Context, Result, bail};
use std::env;
use std::str::FromStr;

/// Shortest signing secret accepted for HS256.
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub otp_ttl_seconds: u64,
    pub otp_max_attempts: u32,
    pub bcrypt_cost: u32,
    pub redis_url: Option<String>,
    pub server_port: u16,
    pub email: Option<EmailConfig>,
    /// Requests allowed per client in one rate-limit window.
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
}

/// SMTP settings used to deliver one-time codes.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

impl Config {
    /// Loads configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL not set")?;

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?;
        let acquire_timeout_seconds = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECONDS", 3u64)?;

        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET not set")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let access_token_ttl_seconds = parse_or(&lookup, "ACCESS_TOKEN_TTL_SECONDS", 30 * 60u64)?;
        let refresh_token_ttl_seconds =
            parse_or(&lookup, "REFRESH_TOKEN_TTL_SECONDS", 7 * 24 * 60 * 60u64)?;
        if access_token_ttl_seconds == 0 || refresh_token_ttl_seconds == 0 {
            bail!("Token lifetimes must be greater than zero");
        }

        let otp_ttl_seconds = parse_or(&lookup, "OTP_TTL_SECONDS", 10 * 60u64)?;
        let otp_max_attempts = parse_or(&lookup, "OTP_MAX_ATTEMPTS", 5u32)?;
        if otp_max_attempts == 0 {
            bail!("OTP_MAX_ATTEMPTS must be greater than zero");
        }

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        let server_port = parse_or(&lookup, "SERVER_PORT", 3000u16)?;
        let email = EmailConfig::from_lookup(&lookup)?;

        let rate_limit_requests = parse_or(&lookup, "RATE_LIMIT_REQUESTS", 100u32)?;
        let rate_limit_window_seconds = parse_or(&lookup, "RATE_LIMIT_WINDOW_SECONDS", 60u64)?;
        if rate_limit_requests == 0 || rate_limit_window_seconds == 0 {
            bail!("Rate limit requests and window must be greater than zero");
        }

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            jwt_secret,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            otp_ttl_seconds,
            otp_max_attempts,
            bcrypt_cost,
            redis_url,
            server_port,
            email,
            rate_limit_requests,
            rate_limit_window_seconds,
        })
    }

    /// Returns the SMTP settings, if mail delivery is configured.
    pub fn email_config(&self) -> Option<EmailConfig> {
        self.email.clone()
    }
}

impl EmailConfig {
    /// Mail is enabled only when a host and sender address are both present.
    fn from_lookup<F>(lookup: &F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(smtp_host), Some(from_email)) = (lookup("SMTP_HOST"), lookup("FROM_EMAIL"))
        else {
            return Ok(None);
        };

        Ok(Some(EmailConfig {
            smtp_host,
            smtp_port: parse_or(lookup, "SMTP_PORT", 587u16)?,
            smtp_username: lookup("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: lookup("SMTP_PASSWORD").unwrap_or_default(),
            from_email,
            from_name: lookup("FROM_NAME").unwrap_or_else(|| "Student Management".to_string()),
        }))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .with_context(|| format!("{key} must be a valid number")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite::memory:"), ("JWT_SECRET", SECRET)]))
                .unwrap();

        assert_eq!(config.access_token_ttl_seconds, 1800);
        assert_eq!(config.refresh_token_ttl_seconds, 604_800);
        assert_eq!(config.otp_ttl_seconds, 600);
        assert_eq!(config.otp_max_attempts, 5);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.server_port, 3000);
        assert!(config.redis_url.is_none());
        assert!(config.email.is_none());
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.rate_limit_window_seconds, 60);
    }

    #[test]
    fn test_rate_limit_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("RATE_LIMIT_REQUESTS", "20"),
            ("RATE_LIMIT_WINDOW_SECONDS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.rate_limit_requests, 20);
        assert_eq!(config.rate_limit_window_seconds, 10);

        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("RATE_LIMIT_REQUESTS", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite::memory:")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", "short"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("SERVER_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn test_email_config_requires_host_and_sender() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("SMTP_HOST", "smtp.example.com"),
        ]))
        .unwrap();
        assert!(config.email.is_none());

        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("SMTP_HOST", "smtp.example.com"),
            ("FROM_EMAIL", "noreply@example.com"),
        ]))
        .unwrap();
        let email = config.email_config().unwrap();
        assert_eq!(email.smtp_port, 587);
        assert_eq!(email.from_name, "Student Management");
    }
}
