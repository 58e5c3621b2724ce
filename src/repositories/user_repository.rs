use crate::clock::Millis;
use crate::models::user::{NewUser, User};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
    #[error("Record changed concurrently")]
    Conflict,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

const USER_COLUMNS: &str = "id, name, email, password_hash, age, verified, verification_token, \
     recovery_token, recovery_issued_at, recovery_expires_at, login_count, created_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn find_by_recovery_token(&self, token: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_verification_token(&self, token: &str) -> RepositoryResult<Option<User>>;

    /// Stores a new recovery token only if `recovery_issued_at` still holds
    /// `expected_issued_at`; otherwise fails with [`RepositoryError::Conflict`].
    async fn update_recovery_fields(
        &self,
        id: i64,
        token: &str,
        issued_at: Millis,
        expires_at: Millis,
        expected_issued_at: Option<Millis>,
    ) -> RepositoryResult<()>;
    async fn clear_recovery_token(&self, id: i64) -> RepositoryResult<()>;

    /// Sets the password and clears the recovery token in one statement,
    /// provided the stored token is still `token`.
    async fn reset_password(
        &self,
        id: i64,
        token: &str,
        password_hash: &str,
    ) -> RepositoryResult<()>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;
    async fn verify_email(&self, id: i64) -> RepositoryResult<()>;

    /// Bumps the login counter and returns the new value.
    async fn record_login(&self, id: i64) -> RepositoryResult<i64>;
    async fn purge_expired_recovery_tokens(&self, now: Millis) -> RepositoryResult<u64>;
    async fn delete_user(&self, id: i64) -> RepositoryResult<()>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn missing_or_conflict(&self, id: i64) -> RepositoryError {
        match self.find_by_id(id).await {
            Ok(Some(_)) => RepositoryError::Conflict,
            Ok(None) => RepositoryError::NotFound,
            Err(e) => e,
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, new_user: NewUser) -> RepositoryResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, age, verification_token)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.age)
        .bind(&new_user.verification_token)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => {
                let id = res.last_insert_rowid();
                self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
            }
            Err(e) => {
                if e.to_string().contains("UNIQUE") {
                    Err(RepositoryError::AlreadyExists)
                } else {
                    Err(RepositoryError::Database(e))
                }
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_recovery_token(&self, token: &str) -> RepositoryResult<Option<User>> {
        self.find_one("recovery_token", token).await
    }

    async fn find_by_verification_token(&self, token: &str) -> RepositoryResult<Option<User>> {
        self.find_one("verification_token", token).await
    }

    async fn update_recovery_fields(
        &self,
        id: i64,
        token: &str,
        issued_at: Millis,
        expires_at: Millis,
        expected_issued_at: Option<Millis>,
    ) -> RepositoryResult<()> {
        // `IS` compares NULL as a value, so a first issuance matches too
        let result = sqlx::query(
            r#"
            UPDATE users
            SET recovery_token = ?, recovery_issued_at = ?, recovery_expires_at = ?
            WHERE id = ? AND recovery_issued_at IS ?
            "#,
        )
        .bind(token)
        .bind(issued_at)
        .bind(expires_at)
        .bind(id)
        .bind(expected_issued_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_conflict(id).await);
        }

        Ok(())
    }

    async fn clear_recovery_token(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET recovery_token = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn reset_password(
        &self,
        id: i64,
        token: &str,
        password_hash: &str,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, recovery_token = NULL
            WHERE id = ? AND recovery_token = ?
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_conflict(id).await);
        }

        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn verify_email(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET verified = 1, verification_token = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn record_login(&self, id: i64) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET login_count = login_count + 1 WHERE id = ? RETURNING login_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        count.ok_or(RepositoryError::NotFound)
    }

    async fn purge_expired_recovery_tokens(&self, now: Millis) -> RepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET recovery_token = NULL
            WHERE recovery_token IS NOT NULL AND recovery_expires_at < ?
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_user(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id DESC LIMIT ? OFFSET ?");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }
}
