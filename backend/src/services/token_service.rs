//! Token issuance and verification.
//!
//! Wraps [`JwtUtils`] with the revocation blacklist so that every verification
//! runs signature, expiry, type and revocation checks in that order.

use crate::database::models::Role;
use crate::errors::{AuthError, ServiceResult};
use crate::services::revocation_service::RevocationStore;
use crate::utils::jwt::{Claims, JwtUtils, TokenPair, TokenType};

#[derive(Clone)]
pub struct TokenService {
    jwt: JwtUtils,
    revocations: RevocationStore,
}

impl TokenService {
    pub fn new(jwt: JwtUtils, revocations: RevocationStore) -> Self {
        Self { jwt, revocations }
    }

    pub fn access_ttl_seconds(&self) -> u64 {
        self.jwt.access_ttl_seconds()
    }

    /// Mints an access token and a refresh token for the user.
    pub fn issue(&self, user_id: i64, role: Role) -> ServiceResult<TokenPair> {
        self.jwt.generate_pair(user_id, role)
    }

    /// Mints an access token only; refresh tokens are never rotated.
    pub fn issue_access(&self, user_id: i64, role: Role) -> ServiceResult<String> {
        self.jwt.generate_token(user_id, role)
    }

    /// Verifies `token` as a token of kind `expected`.
    ///
    /// # Errors
    /// `TokenInvalid`, `TokenExpired`, `TokenType` or `TokenRevoked`, whichever
    /// check fails first
    pub async fn verify(&self, token: &str, expected: TokenType) -> ServiceResult<Claims> {
        let claims = self.jwt.validate_token(token, expected)?;

        if self.revocations.is_revoked(&claims).await? {
            return Err(AuthError::TokenRevoked.into());
        }

        Ok(claims)
    }

    /// Subject of a currently valid access token, without the revocation
    /// lookup. Only fit for bucketing requests, never for authorization.
    pub fn subject_of(&self, token: &str) -> Option<String> {
        self.jwt
            .validate_token(token, TokenType::Access)
            .ok()
            .map(|claims| claims.sub)
    }

    /// Blacklists a verified token until its natural expiry.
    pub async fn revoke(&self, claims: &Claims) -> ServiceResult<bool> {
        self.revocations.revoke(claims).await
    }
}
