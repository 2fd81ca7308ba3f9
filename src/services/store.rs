use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{User, UserRole};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint conflict on email. Also surfaced when two concurrent
    /// registrations race past the duplicate pre-check; the store's unique
    /// index is the authoritative guard.
    #[error("account already exists")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub verification_token: String,
}

/// Seam to the durable user store. The service layer never issues queries
/// directly; tests substitute an in-memory implementation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Atomically marks the account holding this verification token as
    /// verified and clears the token. Returns the account id, or `None` when
    /// no account holds the token (including a token already consumed).
    async fn consume_verification_token(&self, token: &str) -> Result<Option<Uuid>, StoreError>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Atomically consumes an unexpired reset token: replaces the password
    /// hash and clears the token in one operation. Returns the account id, or
    /// `None` when no account holds an unexpired match (including a token
    /// already consumed).
    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: PgRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: UserRole::from_str(&role),
        is_verified: row.get("is_verified"),
        verification_token: row.get("verification_token"),
        reset_token: row.get("reset_token"),
        reset_token_expires_at: row.get("reset_token_expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_verified, \
     verification_token, reset_token, reset_token_expires_at, created_at, updated_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, role, is_verified,
                verification_token, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, 'user', false, $5, $6, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.verification_token)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Backend(anyhow!("failed to insert user: {}", e)),
        })?;

        Ok(row_to_user(row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!("failed to look up user by email: {}", e))?;

        Ok(row.map(row_to_user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!("failed to look up user by id: {}", e))?;

        Ok(row.map(row_to_user))
    }

    async fn consume_verification_token(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        // Single conditional UPDATE over the unique token index: a second
        // attempt with the same token matches no row.
        let row = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = true, verification_token = NULL, updated_at = $1
            WHERE verification_token = $2
            RETURNING id
            "#,
        )
        .bind(Utc::now())
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("failed to consume verification token: {}", e))?;

        Ok(row.map(|row| row.get("id")))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token = $1, reset_token_expires_at = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("failed to set reset token: {}", e))?;

        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        // Same single conditional UPDATE as verification: concurrent attempts
        // with one token race on the unique index and only one matches a row.
        let row = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, reset_token = NULL, reset_token_expires_at = NULL,
                updated_at = $2
            WHERE reset_token = $3 AND reset_token_expires_at > $2
            RETURNING id
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("failed to consume reset token: {}", e))?;

        Ok(row.map(|row| row.get("id")))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1 as test")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("database ping failed: {}", e))?;
        Ok(())
    }
}
