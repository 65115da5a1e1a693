use crate::models::users::User;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn get_user(&self, user_id: i32) -> Result<Option<User>, anyhow::Error>;

    /// Resolves a raw bearer token to the id of the user it was issued to.
    async fn find_user_by_token(&self, token: &str) -> Result<Option<i32>, anyhow::Error>;

    async fn set_push_token(
        &self,
        user_id: i32,
        push_token: Option<&str>,
    ) -> Result<bool, anyhow::Error>;
}

/// Tokens are stored as hex-encoded SHA-256 digests, never in the clear.
pub fn hash_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Creates a new bearer token for `user_id` and returns it. Only the
    /// digest is persisted.
    pub async fn issue_token(&self, user_id: i32) -> Result<String, anyhow::Error> {
        if self.get_user(user_id).await?.is_none() {
            anyhow::bail!("User not found: {}", user_id)
        }

        let token = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );

        sqlx::query("INSERT INTO user_tokens (token_hash, user_id) VALUES ($1, $2)")
            .bind(hash_token(&token))
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        Ok(token)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn get_user(&self, user_id: i32) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, phone, push_token FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<i32>, anyhow::Error> {
        let user_id: Option<i32> =
            sqlx::query_scalar("SELECT user_id FROM user_tokens WHERE token_hash = $1")
                .bind(hash_token(token))
                .fetch_optional(&self.conn)
                .await?;

        Ok(user_id)
    }

    async fn set_push_token(
        &self,
        user_id: i32,
        push_token: Option<&str>,
    ) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("UPDATE users SET push_token = $1 WHERE id = $2")
            .bind(push_token)
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
