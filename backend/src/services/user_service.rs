//! User business logic service.
//!
//! Administrative operations on existing accounts. Access to these is decided
//! by the route layer; the service only enforces rules about the data.

use crate::auth::models::Identity;
use crate::database::models::{Role, UserProfile};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::user_repository::UserRepository;
use crate::state::AppState;

pub struct UserService<'a> {
    state: &'a AppState,
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Retrieves a user by ID with existence verification.
    ///
    /// # Errors
    /// Returns `ServiceError::NotFound` if user doesn't exist
    pub async fn get_user_required(&self, id: i64) -> ServiceResult<UserProfile> {
        let user = UserRepository::new(&self.state.pool)
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id.to_string()))?;
        Ok(user.into())
    }

    /// Assigns a new role. Tokens already issued keep the old role until
    /// they are refreshed.
    pub async fn change_role(
        &self,
        actor: &Identity,
        id: i64,
        role: Role,
    ) -> ServiceResult<UserProfile> {
        if actor.user_id == id && role != actor.role {
            return Err(ServiceError::invalid_operation(
                "Administrators cannot change their own role",
            ));
        }

        let user = UserRepository::new(&self.state.pool)
            .update_role(id, role, self.state.clock.now())
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id.to_string()))?;

        tracing::info!("User {} changed role of user {} to {}", actor.user_id, id, role);
        Ok(user.into())
    }

    /// Soft-deactivates an account; it can no longer log in or refresh.
    pub async fn deactivate(&self, actor: &Identity, id: i64) -> ServiceResult<UserProfile> {
        if actor.user_id == id {
            return Err(ServiceError::invalid_operation(
                "Administrators cannot deactivate themselves",
            ));
        }

        let user = UserRepository::new(&self.state.pool)
            .deactivate_user(id, self.state.clock.now())
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id.to_string()))?;

        tracing::info!("User {} deactivated user {}", actor.user_id, id);
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{CreateUser, User};
    use crate::state::testing::{TestContext, test_state};
    use crate::utils::clock::Clock;

    async fn insert(ctx: &TestContext, email: &str, username: &str, role: Role) -> User {
        UserRepository::new(&ctx.state.pool)
            .create_user(
                CreateUser {
                    email: email.to_string(),
                    username: username.to_string(),
                    password_hash: "hash".to_string(),
                    role,
                },
                ctx.clock.now(),
            )
            .await
            .unwrap()
    }

    fn actor(user: &User) -> Identity {
        Identity {
            user_id: user.id,
            role: user.role,
        }
    }

    #[tokio::test]
    async fn test_get_user_required() {
        let ctx = test_state().await;
        let user = insert(&ctx, "a@x.com", "alice", Role::Student).await;
        let service = UserService::new(&ctx.state);

        assert_eq!(service.get_user_required(user.id).await.unwrap().email, "a@x.com");
        assert!(matches!(
            service.get_user_required(user.id + 100).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_change_role_and_deactivate() {
        let ctx = test_state().await;
        let admin = insert(&ctx, "admin@x.com", "admin", Role::Admin).await;
        let user = insert(&ctx, "a@x.com", "alice", Role::Student).await;
        let service = UserService::new(&ctx.state);

        let updated = service
            .change_role(&actor(&admin), user.id, Role::Faculty)
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Faculty);

        let deactivated = service.deactivate(&actor(&admin), user.id).await.unwrap();
        assert!(!deactivated.is_active);
    }

    #[tokio::test]
    async fn test_admin_cannot_lock_themselves_out() {
        let ctx = test_state().await;
        let admin = insert(&ctx, "admin@x.com", "admin", Role::Admin).await;
        let service = UserService::new(&ctx.state);

        assert!(matches!(
            service.deactivate(&actor(&admin), admin.id).await,
            Err(ServiceError::InvalidOperation { .. })
        ));
        assert!(matches!(
            service.change_role(&actor(&admin), admin.id, Role::Student).await,
            Err(ServiceError::InvalidOperation { .. })
        ));
    }
}
