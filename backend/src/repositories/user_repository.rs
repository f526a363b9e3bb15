//! Database repository for user management operations.
//!
//! Provides create/read/update operations for system users. Users are never
//! hard-deleted; deactivation flips `is_active`.

use crate::database::models::{CreateUser, Role, User};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "id, email, username, password_hash, role, is_active, is_verified, \
                            last_login, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Creates a new UserRepository instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new user in the database.
    ///
    /// New users start active and unverified.
    ///
    /// # Arguments
    /// * `user` - CreateUser DTO containing user details
    /// * `now` - Creation timestamp
    ///
    /// # Returns
    /// The newly created User with all fields populated
    pub async fn create_user(&self, user: CreateUser, now: DateTime<Utc>) -> Result<User> {
        let query = format!(
            "INSERT INTO users (email, username, password_hash, role, is_active, is_verified, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, 0, ?, ?)
             RETURNING {USER_COLUMNS}"
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.email)
            .bind(user.username)
            .bind(user.password_hash)
            .bind(user.role)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool)
            .await?;

        Ok(user)
    }

    /// Retrieves a user by their unique identifier.
    ///
    /// # Returns
    /// `Some(User)` if found, `None` otherwise
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Retrieves a user by their email (case-insensitive).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Checks if a username already exists in the system.
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Checks if an email already exists in the system.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Replaces the stored password hash.
    ///
    /// # Returns
    /// `true` if a row was updated
    pub async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Marks the user's email address as verified.
    pub async fn mark_verified(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let rows = sqlx::query("UPDATE users SET is_verified = 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Stamps the time of the latest successful login.
    pub async fn touch_last_login(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Changes the user's role and returns the updated row.
    pub async fn update_role(&self, id: i64, role: Role, now: DateTime<Utc>) -> Result<Option<User>> {
        let query = format!(
            "UPDATE users SET role = ?, updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(role)
            .bind(now)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Soft-deactivates the user and returns the updated row.
    pub async fn deactivate_user(&self, id: i64, now: DateTime<Utc>) -> Result<Option<User>> {
        let query = format!(
            "UPDATE users SET is_active = 0, updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(now)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;

    fn new_user(email: &str, username: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        let created = repo
            .create_user(new_user("a@x.com", "alice"), Utc::now())
            .await
            .unwrap();
        assert!(created.is_active);
        assert!(!created.is_verified);
        assert_eq!(created.role, Role::Student);

        let by_id = repo.get_user_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");

        let by_email = repo.get_user_by_email("A@X.COM").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));

        assert!(repo.email_exists("a@x.com").await.unwrap());
        assert!(repo.username_exists("alice").await.unwrap());
        assert!(!repo.username_exists("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_constraints_enforced() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        repo.create_user(new_user("a@x.com", "alice"), Utc::now())
            .await
            .unwrap();
        assert!(
            repo.create_user(new_user("a@x.com", "other"), Utc::now())
                .await
                .is_err()
        );
        assert!(
            repo.create_user(new_user("b@x.com", "alice"), Utc::now())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_updates() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        let user = repo
            .create_user(new_user("a@x.com", "alice"), Utc::now())
            .await
            .unwrap();

        assert!(repo.update_password(user.id, "new-hash", Utc::now()).await.unwrap());
        assert!(repo.mark_verified(user.id, Utc::now()).await.unwrap());
        repo.touch_last_login(user.id, Utc::now()).await.unwrap();

        let updated = repo.update_role(user.id, Role::Faculty, Utc::now()).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "new-hash");
        assert!(updated.is_verified);
        assert!(updated.last_login.is_some());
        assert_eq!(updated.role, Role::Faculty);

        let deactivated = repo.deactivate_user(user.id, Utc::now()).await.unwrap().unwrap();
        assert!(!deactivated.is_active);

        assert!(repo.deactivate_user(9999, Utc::now()).await.unwrap().is_none());
        assert!(!repo.update_password(9999, "x", Utc::now()).await.unwrap());
    }
}
