//! Core business logic for the authentication system.
//!
//! Every flow here runs after request parsing and, where relevant, after the
//! bearer token has been verified by middleware.

use crate::auth::models::*;
use crate::database::models::UserProfile;
use crate::errors::{AuthError, ServiceError, ServiceResult};
use crate::repositories::user_repository::UserRepository;
use crate::services::credential_service::CredentialService;
use crate::services::otp_service::OtpPurpose;
use crate::state::AppState;
use crate::utils::jwt::{Claims, TokenType};
use validator::Validate;

const BEARER: &str = "bearer";

/// Authentication service for handling login, token lifecycle and account recovery
pub struct AuthService<'a> {
    state: &'a AppState,
    credentials: CredentialService<'a>,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            credentials: CredentialService::new(state),
        }
    }

    /// Registers a user and mails an email-verification code.
    ///
    /// Mail delivery problems are logged and never fail the registration.
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<UserProfile> {
        let user = self.credentials.register(request).await?;
        self.send_code(OtpPurpose::EmailVerification, &user.email);
        Ok(user.into())
    }

    /// Authenticate user and generate a token pair
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginResponse> {
        validate(&request)?;

        let user = self
            .credentials
            .authenticate(&request.email, &request.password)
            .await?;
        let pair = self.state.tokens.issue(user.id, user.role)?;

        tracing::info!("User {} logged in", user.id);

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: BEARER.to_string(),
            expires_in: pair.expires_in,
            user: user.into(),
        })
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The role is read from the database, not from the token, so a role
    /// change takes effect at the next refresh. The refresh token itself is
    /// not rotated.
    pub async fn refresh_token(
        &self,
        request: RefreshTokenRequest,
    ) -> ServiceResult<RefreshTokenResponse> {
        validate(&request)?;

        let claims = self
            .state
            .tokens
            .verify(&request.refresh_token, TokenType::Refresh)
            .await?;
        let user_id = claims.user_id()?;

        let user = UserRepository::new(&self.state.pool)
            .get_user_by_id(user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AuthError::token_invalid("user missing or inactive"))?;

        let access_token = self.state.tokens.issue_access(user.id, user.role)?;

        Ok(RefreshTokenResponse {
            access_token,
            token_type: BEARER.to_string(),
            expires_in: self.state.tokens.access_ttl_seconds(),
        })
    }

    /// Revokes the caller's access token and, if given, their refresh token.
    ///
    /// # Errors
    /// - `TokenInvalid` when the refresh token belongs to someone else; nothing
    ///   is revoked in that case
    /// - `PartialRevocation` when the access token was revoked but the refresh
    ///   token could not be
    pub async fn logout(
        &self,
        access: &Claims,
        request: LogoutRequest,
    ) -> ServiceResult<LogoutResponse> {
        let refresh = match request.refresh_token.as_deref() {
            Some(token) => self.verify_refresh_for_logout(access, token).await?,
            None => None,
        };

        let mut revoked = Vec::new();
        if self.state.tokens.revoke(access).await? {
            revoked.push(TokenType::Access.to_string());
        }

        if let Some(refresh) = refresh {
            match self.state.tokens.revoke(&refresh).await {
                Ok(true) => revoked.push(TokenType::Refresh.to_string()),
                Ok(false) => {}
                Err(e) if revoked.is_empty() => return Err(e),
                Err(e) => {
                    tracing::error!(
                        "Revoked access token {} but not refresh token {}: {}",
                        access.jti,
                        refresh.jti,
                        e
                    );
                    return Err(AuthError::PartialRevocation {
                        revoked,
                        failed: TokenType::Refresh.to_string(),
                    }
                    .into());
                }
            }
        }

        tracing::info!("User {} logged out, revoked {:?}", access.sub, revoked);
        Ok(LogoutResponse { revoked })
    }

    async fn verify_refresh_for_logout(
        &self,
        access: &Claims,
        token: &str,
    ) -> ServiceResult<Option<Claims>> {
        match self.state.tokens.verify(token, TokenType::Refresh).await {
            Ok(claims) if claims.sub == access.sub => Ok(Some(claims)),
            Ok(_) => Err(AuthError::token_invalid("refresh token belongs to another user").into()),
            Err(ServiceError::Auth {
                source: AuthError::TokenExpired | AuthError::TokenRevoked,
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Mails a password-reset code if an active account exists.
    ///
    /// Succeeds the same way whether or not it does.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> ServiceResult<()> {
        validate(&request)?;
        let email = normalize_email(&request.email);

        match UserRepository::new(&self.state.pool)
            .get_user_by_email(&email)
            .await?
        {
            Some(user) if user.is_active => {
                self.send_code(OtpPurpose::PasswordReset, &user.email);
            }
            _ => tracing::info!("Password reset requested for unknown or inactive account"),
        }

        Ok(())
    }

    /// Sets a new password after checking the reset code.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> ServiceResult<()> {
        validate(&request)?;
        let email = normalize_email(&request.email);

        self.state
            .otp
            .verify(OtpPurpose::PasswordReset, &email, &request.otp)
            .await?;

        let repo = UserRepository::new(&self.state.pool);
        let user = repo
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidOtp)?;

        let password_hash = self.credentials.hash_password(&request.new_password).await?;
        repo.update_password(user.id, &password_hash, self.state.clock.now())
            .await?;

        tracing::info!("Password reset for user {}", user.id);
        Ok(())
    }

    /// Marks the account verified after checking the verification code.
    pub async fn verify_email(&self, request: VerifyEmailRequest) -> ServiceResult<UserProfile> {
        validate(&request)?;
        let email = normalize_email(&request.email);

        self.state
            .otp
            .verify(OtpPurpose::EmailVerification, &email, &request.otp)
            .await?;

        let repo = UserRepository::new(&self.state.pool);
        let user = repo
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidOtp)?;
        repo.mark_verified(user.id, self.state.clock.now()).await?;

        tracing::info!("Email verified for user {}", user.id);
        let mut profile = UserProfile::from(user);
        profile.is_verified = true;
        Ok(profile)
    }

    /// Issues a fresh verification code for an active, unverified account.
    pub async fn resend_verification(
        &self,
        request: ResendVerificationRequest,
    ) -> ServiceResult<()> {
        validate(&request)?;
        let email = normalize_email(&request.email);

        match UserRepository::new(&self.state.pool)
            .get_user_by_email(&email)
            .await?
        {
            Some(user) if user.is_active && !user.is_verified => {
                self.send_code(OtpPurpose::EmailVerification, &user.email);
            }
            _ => tracing::info!("Verification resend skipped for {}", email),
        }

        Ok(())
    }

    /// Returns the caller's profile.
    pub async fn me(&self, identity: &Identity) -> ServiceResult<UserProfile> {
        let user = UserRepository::new(&self.state.pool)
            .get_user_by_id(identity.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", identity.user_id.to_string()))?;
        Ok(user.into())
    }

    /// Generates a code and hands it to the mailer on a background task.
    ///
    /// The caller returns before the relay answers, so a slow SMTP server
    /// adds nothing to the response time of the account-exists branch.
    fn send_code(&self, purpose: OtpPurpose, email: &str) {
        let otp = self.state.otp.clone();
        let mailer = self.state.mailer.clone();
        let email = email.to_string();

        tokio::spawn(async move {
            let code = match otp.generate(purpose, &email).await {
                Ok(code) => code,
                Err(e) => {
                    tracing::error!("Failed to generate {} code for {}: {}", purpose, email, e);
                    return;
                }
            };

            let Some(mailer) = mailer else {
                tracing::warn!("Mail is disabled; {} code for {} was not sent", purpose, email);
                return;
            };

            match mailer
                .send_otp(&email, purpose, &code, otp.ttl_minutes())
                .await
            {
                Ok(()) => tracing::info!("Sent {} code to {}", purpose, email),
                Err(e) => tracing::error!("Failed to send {} code to {}: {}", purpose, email, e),
            }
        });
    }
}

fn validate<T: Validate>(request: &T) -> ServiceResult<()> {
    request
        .validate()
        .map_err(|errors| ServiceError::from_validation_errors(&errors))
}
