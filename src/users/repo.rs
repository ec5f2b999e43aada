use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewUser, User};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_verified_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn count_pending(&self, email: &str) -> anyhow::Result<i64>;
    /// Unverified records for `email`, newest first.
    async fn list_pending(&self, email: &str) -> anyhow::Result<Vec<User>>;
    async fn list_verified(&self) -> anyhow::Result<Vec<User>>;
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
    /// Drop every unverified record for `email` except `keep`.
    async fn delete_pending_except(&self, email: &str, keep: Uuid) -> anyhow::Result<u64>;
    /// Clear the OTP fields and flag the account as verified.
    /// `None` when the record is gone or was already verified.
    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<(&str, OffsetDateTime)>,
    ) -> anyhow::Result<()>;
    /// Verified user whose stored reset hash matches and has not expired at `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;
    /// Replace the credential hash and clear any reset token.
    async fn replace_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<User>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, role, account_verified,
    verification_code, verification_code_expire,
    reset_password_token, reset_password_expire,
    avatar_public_id, avatar_url, created_at
"#;

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_verified_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND account_verified"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn count_pending(&self, email: &str) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE email = $1 AND NOT account_verified",
        )
        .bind(email)
        .fetch_one(&self.db)
        .await?;
        Ok(n)
    }

    async fn list_pending(&self, email: &str) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE email = $1 AND NOT account_verified
            ORDER BY created_at DESC
            "#
        ))
        .bind(email)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_verified(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE account_verified ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let (avatar_public_id, avatar_url) = match user.avatar {
            Some(a) => (Some(a.public_id), Some(a.url)),
            None => (None, None),
        };
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, role, account_verified,
                verification_code, verification_code_expire,
                avatar_public_id, avatar_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.account_verified)
        .bind(user.verification_code)
        .bind(user.verification_code_expire)
        .bind(avatar_public_id)
        .bind(avatar_url)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_pending_except(&self, email: &str, keep: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query(
            "DELETE FROM users WHERE email = $1 AND NOT account_verified AND id <> $2",
        )
        .bind(email)
        .bind(keep)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET account_verified = TRUE,
                   verification_code = NULL,
                   verification_code_expire = NULL
             WHERE id = $1 AND NOT account_verified
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<(&str, OffsetDateTime)>,
    ) -> anyhow::Result<()> {
        let (hash, expire) = match token {
            Some((h, e)) => (Some(h), Some(e)),
            None => (None, None),
        };
        sqlx::query(
            "UPDATE users SET reset_password_token = $2, reset_password_expire = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .bind(expire)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE reset_password_token = $1
              AND reset_password_expire > $2
              AND account_verified
            "#
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn replace_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET password_hash = $2,
                   reset_password_token = NULL,
                   reset_password_expire = NULL
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}
