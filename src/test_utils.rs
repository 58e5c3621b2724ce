pub mod test_helpers {
    use crate::clock::{Clock, Millis};
    use crate::services::email_service::{EmailError, EmailService, OutgoingEmail};
    use async_trait::async_trait;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Mutex,
    };
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing.
    /// Needed when several connections must see the same data.
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        name: &str,
        email: &str,
        password: &str,
        verified: bool,
    ) -> Result<i64, sqlx::Error> {
        let password_hash = crate::auth::password::hash_password(password).map_err(|e| {
            sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
        })?;

        let result = sqlx::query(
            "INSERT INTO users (name, email, password_hash, verified) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(verified)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now: AtomicI64,
    }

    impl ManualClock {
        pub fn new(start: Millis) -> Self {
            Self {
                now: AtomicI64::new(start),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
        }

        pub fn set(&self, millis: Millis) {
            self.now.store(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> Millis {
            self.now.load(Ordering::SeqCst)
        }
    }

    /// Keeps every message it is asked to send. With `failing()` it still
    /// records the attempt but reports a transport error.
    #[derive(Default)]
    pub struct RecordingEmailService {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: AtomicBool,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let service = Self::default();
            service.set_failing(true);
            service
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        pub fn last(&self) -> Option<OutgoingEmail> {
            self.sent().pop()
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn send_email(&self, email: OutgoingEmail) -> Result<(), EmailError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmailError::SendFailed("simulated outage".to_string()));
            }
            Ok(())
        }
    }

    /// Pulls the `token` query value out of a verification or recovery link
    /// inside an email body.
    pub fn token_from_email(email: &OutgoingEmail) -> Option<String> {
        let start = email.html_body.find("?token=")? + "?token=".len();
        let token: String = email.html_body[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        (!token.is_empty()).then_some(token)
    }
}

// Re-export commonly used test functions at module level for convenience
pub use test_helpers::*;
