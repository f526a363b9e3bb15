//! JWT token utilities for authentication and authorization.
//!
//! Provides token creation, validation, and claims management for user
//! sessions. Two kinds of tokens are minted from the same secret: short-lived
//! access tokens carrying the user's role, and long-lived refresh tokens that
//! can only be exchanged for a new access token. The kind is an explicit claim
//! and is checked on every decode.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::Role;
use crate::errors::{AuthError, ServiceError, ServiceResult};
use crate::utils::clock::Clock;

/// The signing algorithm is fixed; tokens using anything else are rejected.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims structure shared by access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// User role; access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub token_type: TokenType,
    /// Unique token identifier, used as the revocation key
    pub jti: String,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AuthError::token_invalid("subject is not a user id"))
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// A token is dead from its `exp` second onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    /// Time left until natural expiry, `None` once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Option<Duration> {
        let remaining = self.exp - now.timestamp();
        (remaining > 0).then(|| Duration::seconds(remaining))
    }
}

/// Freshly minted credentials handed back to the client on login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// JWT token utility for creating and validating tokens
#[derive(Clone)]
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtUtils {
    /// Create a new JwtUtils instance from the loaded configuration
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        // Expiry is checked against the injected clock after decoding.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        JwtUtils {
            encoding_key,
            decoding_key,
            validation,
            access_ttl: Duration::seconds(config.access_token_ttl_seconds as i64),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_seconds as i64),
            clock,
        }
    }

    pub fn access_ttl_seconds(&self) -> u64 {
        self.access_ttl.num_seconds() as u64
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Generate an access token and a refresh token for the user
    pub fn generate_pair(&self, user_id: i64, role: Role) -> ServiceResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_token(user_id, role)?,
            refresh_token: self.generate_refresh_token(user_id)?,
            expires_in: self.access_ttl_seconds(),
        })
    }

    /// Generate a new access token
    pub fn generate_token(&self, user_id: i64, role: Role) -> ServiceResult<String> {
        self.sign(user_id, Some(role), TokenType::Access, self.access_ttl)
    }

    /// Generate a refresh token (longer expiration, no role)
    pub fn generate_refresh_token(&self, user_id: i64) -> ServiceResult<String> {
        self.sign(user_id, None, TokenType::Refresh, self.refresh_ttl)
    }

    fn sign(
        &self,
        user_id: i64,
        role: Option<Role>,
        token_type: TokenType,
        ttl: Duration,
    ) -> ServiceResult<String> {
        let now = self.clock.now();
        let exp = now + ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            token_type,
            jti: Uuid::now_v7().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            ServiceError::internal_error(format!("{token_type} token generation failed: {e}"))
        })
    }

    /// Validate and decode a JWT token.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// signature and format, then expiry, then token type.
    pub fn validate_token(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| AuthError::token_invalid(e.to_string()))?;

        if claims.is_expired_at(self.clock.now()) {
            return Err(AuthError::TokenExpired);
        }

        if claims.token_type != expected {
            return Err(AuthError::TokenType {
                expected: expected.to_string(),
                found: claims.token_type.to_string(),
            });
        }

        if claims.token_type == TokenType::Access && claims.role.is_none() {
            return Err(AuthError::token_invalid("access token without role"));
        }

        Ok(claims)
    }
}
