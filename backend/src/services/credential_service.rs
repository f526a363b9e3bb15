//! Credential business logic service.
//!
//! Owns password hashing and the two operations that touch plaintext
//! passwords: registering a user and authenticating one.

use crate::auth::models::{MAX_PASSWORD_BYTES, RegisterRequest, normalize_email};
use crate::database::models::{CreateUser, User};
use crate::errors::{AuthError, ServiceError, ServiceResult};
use crate::repositories::user_repository::UserRepository;
use crate::state::AppState;
use validator::Validate;

pub struct CredentialService<'a> {
    state: &'a AppState,
}

impl<'a> CredentialService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Creates a new active, unverified user.
    ///
    /// Email and username are normalized before validation, so length limits
    /// apply to the stored values.
    ///
    /// # Errors
    /// Returns `ServiceError` for:
    /// - Validation failures, with one detail per offending field
    /// - Duplicate email or username, including a race lost at insert time
    /// - Database errors
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<User> {
        let request = RegisterRequest {
            email: normalize_email(&request.email),
            username: request.username.trim().to_string(),
            ..request
        };
        if let Err(validation_errors) = request.validate() {
            return Err(ServiceError::from_validation_errors(&validation_errors));
        }

        let RegisterRequest {
            email,
            username,
            password,
            role,
        } = request;

        let repo = UserRepository::new(&self.state.pool);
        if repo.email_exists(&email).await? {
            return Err(ServiceError::already_exists("User", &email));
        }
        if repo.username_exists(&username).await? {
            return Err(ServiceError::already_exists("User", &username));
        }

        let password_hash = self.hash_password(&password).await?;

        let data = CreateUser {
            email: email.clone(),
            username,
            password_hash,
            role,
        };

        match repo.create_user(data, self.state.clock.now()).await {
            Ok(user) => {
                tracing::info!("Registered user {} with role {}", user.id, user.role);
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => Err(ServiceError::already_exists("User", &email)),
            Err(e) => Err(e.into()),
        }
    }

    /// Checks an email/password pair and stamps `last_login` on success.
    ///
    /// Unknown email, wrong password and inactive account are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        let repo = UserRepository::new(&self.state.pool);

        // No stored password can be this long; one that shared its first 72
        // bytes with the real one would otherwise verify.
        if password.len() > MAX_PASSWORD_BYTES {
            let _ = self
                .verify_password(password, self.state.dummy_hash())
                .await;
            tracing::warn!("Login attempt with an over-long password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let Some(user) = repo.get_user_by_email(&email).await? else {
            // Burn the same bcrypt work as a real check.
            let _ = self
                .verify_password(password, self.state.dummy_hash())
                .await;
            tracing::warn!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::warn!("Wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.is_active {
            tracing::warn!("Login attempt for inactive user {}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }

        let now = self.state.clock.now();
        repo.touch_last_login(user.id, now).await?;

        Ok(User {
            last_login: Some(now),
            ..user
        })
    }

    /// Hashes a password with the configured bcrypt cost.
    ///
    /// Runs on the blocking pool; bcrypt is deliberately slow.
    pub async fn hash_password(&self, password: &str) -> ServiceResult<String> {
        let password = password.to_string();
        let cost = self.state.config.bcrypt_cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ServiceError::internal_error(format!("Hashing task failed: {e}")))?
            .map_err(|e| ServiceError::internal_error(format!("Password hashing failed: {e}")))
    }

    /// Verifies a password against a stored hash.
    pub async fn verify_password(&self, password: &str, hash: &str) -> ServiceResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ServiceError::internal_error(format!("Hashing task failed: {e}")))?
            .map_err(|e| {
                ServiceError::internal_error(format!("Password verification failed: {e}"))
            })
    }
}

fn is_unique_violation(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;
    use crate::state::testing::test_state;
    use crate::utils::clock::Clock;

    fn register_request(email: &str, username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn test_register_hashes_and_normalizes() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);

        let user = service
            .register(register_request(" Alice@X.com ", "alice", "longenough1"))
            .await
            .unwrap();

        assert_eq!(user.email, "alice@x.com");
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert_ne!(user.password_hash, "longenough1");
        assert!(bcrypt::verify("longenough1", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_validation_reports_fields() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);

        let err = service
            .register(register_request("not-an-email", "al", "short"))
            .await
            .unwrap_err();

        match err {
            ServiceError::Validation { details, .. } => {
                let fields: Vec<&str> = details.iter().map(|(f, _)| f.as_str()).collect();
                assert!(fields.contains(&"email"));
                assert!(fields.contains(&"username"));
                assert!(fields.contains(&"password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_validates_trimmed_username() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);

        let err = service
            .register(register_request("a@x.com", "  ab ", "longenough1"))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation { details, .. } => {
                assert!(details.iter().any(|(field, _)| field == "username"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(
            UserRepository::new(&ctx.state.pool)
                .get_user_by_email("a@x.com")
                .await
                .unwrap()
                .is_none()
        );

        let user = service
            .register(register_request("a@x.com", "  abc ", "longenough1"))
            .await
            .unwrap();
        assert_eq!(user.username, "abc");
    }

    #[tokio::test]
    async fn test_register_rejects_passwords_past_bcrypt_limit() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);

        for password in ["a".repeat(73), "é".repeat(40)] {
            let err = service
                .register(register_request("a@x.com", "alice", &password))
                .await
                .unwrap_err();
            match err {
                ServiceError::Validation { details, .. } => {
                    assert!(details.iter().any(|(field, _)| field == "password"));
                }
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_authenticate_rejects_long_password_sharing_prefix() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);
        let password = "p".repeat(MAX_PASSWORD_BYTES);
        service
            .register(register_request("a@x.com", "alice", &password))
            .await
            .unwrap();

        let longer = format!("{password}-anything");
        let err = service.authenticate("a@x.com", &longer).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::InvalidCredentials));
        assert!(service.authenticate("a@x.com", &password).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_duplicates_conflict() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);
        service
            .register(register_request("a@x.com", "alice", "longenough1"))
            .await
            .unwrap();

        let same_email = service
            .register(register_request("A@x.com", "other", "longenough1"))
            .await;
        assert!(matches!(same_email, Err(ServiceError::AlreadyExists { .. })));

        let same_username = service
            .register(register_request("b@x.com", "alice", "longenough1"))
            .await;
        assert!(matches!(same_username, Err(ServiceError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_unique_violation_detected_at_insert() {
        let ctx = test_state().await;
        let repo = UserRepository::new(&ctx.state.pool);
        let user = || CreateUser {
            email: "a@x.com".to_string(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Student,
        };

        repo.create_user(user(), ctx.clock.now()).await.unwrap();
        let err = repo.create_user(user(), ctx.clock.now()).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_indistinguishable() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);
        service
            .register(register_request("a@x.com", "alice", "longenough1"))
            .await
            .unwrap();

        let wrong_password = service.authenticate("a@x.com", "wrongpassword").await.unwrap_err();
        let unknown_email = service.authenticate("nobody@x.com", "longenough1").await.unwrap_err();

        assert_eq!(wrong_password.as_auth(), Some(&AuthError::InvalidCredentials));
        assert_eq!(unknown_email.as_auth(), Some(&AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_authenticate_stamps_last_login_and_rejects_inactive() {
        let ctx = test_state().await;
        let service = CredentialService::new(&ctx.state);
        let user = service
            .register(register_request("a@x.com", "alice", "longenough1"))
            .await
            .unwrap();
        assert!(user.last_login.is_none());

        let logged_in = service.authenticate("A@X.COM", "longenough1").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login.is_some());

        UserRepository::new(&ctx.state.pool)
            .deactivate_user(user.id, ctx.clock.now())
            .await
            .unwrap();
        let err = service.authenticate("a@x.com", "longenough1").await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::InvalidCredentials));
    }
}
