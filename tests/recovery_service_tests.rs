use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use totalis::{
    repositories::{SqliteUserRepository, UserRepository},
    recovery::RecoveryPolicy,
    services::{
        auth_service::{AuthService, LoginRequest},
        RecoveryError, RecoveryService,
    },
    test_utils::test_helpers::{self, ManualClock, RecordingEmailService},
};

const START: i64 = 1_700_000_000_000;
const BASE_URL: &str = "http://localhost:3000";

struct Fixture {
    pool: SqlitePool,
    clock: Arc<ManualClock>,
    mailer: Arc<RecordingEmailService>,
    service: RecoveryService,
    user_id: i64,
}

impl Fixture {
    async fn with_pool(pool: SqlitePool, mailer: RecordingEmailService) -> Self {
        let user_id = test_helpers::insert_test_user(
            &pool,
            "Ana",
            "ana@example.com",
            "oldpassword1",
            true,
        )
        .await
        .unwrap();

        let clock = Arc::new(ManualClock::new(START));
        let mailer = Arc::new(mailer);
        let service = RecoveryService::new(
            Arc::new(SqliteUserRepository::new(pool.clone())),
            mailer.clone(),
            clock.clone(),
            BASE_URL,
        );

        Self {
            pool,
            clock,
            mailer,
            service,
            user_id,
        }
    }

    async fn new() -> Self {
        let pool = test_helpers::create_test_db().await.unwrap();
        Self::with_pool(pool, RecordingEmailService::new()).await
    }

    fn last_token(&self) -> String {
        let email = self.mailer.last().expect("a recovery email to be sent");
        test_helpers::token_from_email(&email).expect("the email to carry a token")
    }

    fn repository(&self) -> SqliteUserRepository {
        SqliteUserRepository::new(self.pool.clone())
    }
}

#[tokio::test]
async fn test_request_sends_reset_link() {
    let fx = Fixture::new().await;

    let issued = fx.service.request_recovery("ana@example.com").await.unwrap();
    assert_eq!(issued.user_id, fx.user_id);
    assert_eq!(issued.expires_at, START + 3_600_000);
    assert!(issued.delivered);

    let sent = fx.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");

    let token = fx.last_token();
    assert_eq!(token.len(), 64);
    assert!(sent[0]
        .html_body
        .contains(&format!("{BASE_URL}/restablecer.html?token={token}")));

    let user = fx.repository().find_by_id(fx.user_id).await.unwrap().unwrap();
    assert_eq!(user.recovery_token.as_deref(), Some(token.as_str()));
    assert_eq!(user.recovery_issued_at, Some(START));
    assert_eq!(user.recovery_expires_at, Some(START + 3_600_000));
}

#[tokio::test]
async fn test_unknown_email_is_reported() {
    let fx = Fixture::new().await;

    let result = fx.service.request_recovery("nobody@example.com").await;
    assert!(matches!(result, Err(RecoveryError::UnknownUser)));
    assert!(fx.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_email_lookup_ignores_case() {
    let fx = Fixture::new().await;

    let issued = fx.service.request_recovery("  ANA@Example.com").await.unwrap();
    assert_eq!(issued.user_id, fx.user_id);
}

#[tokio::test]
async fn test_second_request_within_cooldown_is_throttled() {
    let fx = Fixture::new().await;

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let first_token = fx.last_token();

    fx.clock.advance(Duration::from_secs(5));
    let result = fx.service.request_recovery("ana@example.com").await;
    assert!(matches!(
        result,
        Err(RecoveryError::RateLimited {
            seconds_remaining: 35
        })
    ));

    // the first token is untouched
    assert_eq!(fx.mailer.sent().len(), 1);
    let user = fx.repository().find_by_id(fx.user_id).await.unwrap().unwrap();
    assert_eq!(user.recovery_token.as_deref(), Some(first_token.as_str()));
}

#[tokio::test]
async fn test_request_after_cooldown_replaces_token() {
    let fx = Fixture::new().await;

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let old_token = fx.last_token();

    fx.clock.advance(Duration::from_secs(41));
    fx.service.request_recovery("ana@example.com").await.unwrap();
    let new_token = fx.last_token();
    assert_ne!(old_token, new_token);

    let result = fx.service.reset_with_token(&old_token, "newpassword1").await;
    assert!(matches!(result, Err(RecoveryError::InvalidToken)));

    fx.service
        .reset_with_token(&new_token, "newpassword1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_changes_password_and_consumes_token() {
    let fx = Fixture::new().await;

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let token = fx.last_token();

    fx.clock.advance(Duration::from_secs(60));
    fx.service
        .reset_with_token(&token, "brandnewpass")
        .await
        .unwrap();

    let auth = AuthService::new(Arc::new(fx.repository()));
    let old_login = auth
        .authenticate(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "oldpassword1".to_string(),
        })
        .await;
    assert!(old_login.is_err());

    let user = auth
        .authenticate(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "brandnewpass".to_string(),
        })
        .await
        .unwrap();
    assert!(user.recovery_token.is_none());

    let reuse = fx.service.reset_with_token(&token, "anotherpass1").await;
    assert!(matches!(reuse, Err(RecoveryError::InvalidToken)));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let fx = Fixture::new().await;

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let token = fx.last_token();

    fx.clock.advance(Duration::from_secs(3601));
    let result = fx.service.reset_with_token(&token, "newpassword1").await;
    assert!(matches!(result, Err(RecoveryError::ExpiredToken)));
}

#[tokio::test]
async fn test_token_valid_at_exact_expiry() {
    let fx = Fixture::new().await;

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let token = fx.last_token();

    fx.clock.advance(Duration::from_secs(3600));
    fx.service
        .reset_with_token(&token, "newpassword1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_weak_password_keeps_token_usable() {
    let fx = Fixture::new().await;

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let token = fx.last_token();

    let result = fx.service.reset_with_token(&token, "short").await;
    assert!(matches!(result, Err(RecoveryError::WeakPassword)));

    fx.service
        .reset_with_token(&token, "longenough1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cooldown_survives_reset() {
    let fx = Fixture::new().await;

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let token = fx.last_token();

    fx.clock.advance(Duration::from_secs(10));
    fx.service
        .reset_with_token(&token, "newpassword1")
        .await
        .unwrap();

    let result = fx.service.request_recovery("ana@example.com").await;
    assert!(matches!(
        result,
        Err(RecoveryError::RateLimited {
            seconds_remaining: 30
        })
    ));
}

#[tokio::test]
async fn test_delivery_failure_keeps_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let fx = Fixture::with_pool(pool, RecordingEmailService::failing()).await;

    let issued = fx.service.request_recovery("ana@example.com").await.unwrap();
    assert!(!issued.delivered);

    let token = fx.last_token();
    let user = fx.repository().find_by_id(fx.user_id).await.unwrap().unwrap();
    assert_eq!(user.recovery_token.as_deref(), Some(token.as_str()));

    // a retry inside the cooldown is still throttled
    fx.clock.advance(Duration::from_secs(1));
    let retry = fx.service.request_recovery("ana@example.com").await;
    assert!(matches!(retry, Err(RecoveryError::RateLimited { .. })));
}

#[tokio::test]
async fn test_concurrent_requests_issue_once() {
    let (pool, _db_file) = test_helpers::create_test_db_file().await.unwrap();
    let fx = Fixture::with_pool(pool, RecordingEmailService::new()).await;

    let (a, b) = tokio::join!(
        fx.service.request_recovery("ana@example.com"),
        fx.service.request_recovery("ana@example.com"),
    );

    let issued = [&a, &b].iter().filter(|r| r.is_ok()).count();
    let throttled = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(RecoveryError::RateLimited { .. })))
        .count();
    assert_eq!(issued, 1);
    assert_eq!(throttled, 1);
    assert_eq!(fx.mailer.sent().len(), 1);

    let token = fx.last_token();
    let user = fx.repository().find_by_id(fx.user_id).await.unwrap().unwrap();
    assert_eq!(user.recovery_token.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn test_legacy_row_uses_expiry_estimate() {
    let fx = Fixture::new().await;

    // issued ten seconds ago, before issuance time was recorded
    sqlx::query("UPDATE users SET recovery_token = ?, recovery_expires_at = ? WHERE id = ?")
        .bind("ab".repeat(32))
        .bind(START - 10_000 + 3_600_000)
        .bind(fx.user_id)
        .execute(&fx.pool)
        .await
        .unwrap();

    let result = fx.service.request_recovery("ana@example.com").await;
    assert!(matches!(
        result,
        Err(RecoveryError::RateLimited {
            seconds_remaining: 30
        })
    ));

    fx.clock.advance(Duration::from_secs(31));
    fx.service.request_recovery("ana@example.com").await.unwrap();
}

#[tokio::test]
async fn test_purge_clears_only_expired_tokens() {
    let fx = Fixture::new().await;
    let other_id =
        test_helpers::insert_test_user(&fx.pool, "Luis", "luis@example.com", "password123", true)
            .await
            .unwrap();

    fx.service.request_recovery("ana@example.com").await.unwrap();
    let expired_token = fx.last_token();

    fx.clock.advance(Duration::from_secs(3000));
    fx.service.request_recovery("luis@example.com").await.unwrap();

    fx.clock.advance(Duration::from_secs(601));
    assert_eq!(fx.service.purge_expired().await.unwrap(), 1);

    let result = fx.service.reset_with_token(&expired_token, "newpassword1").await;
    assert!(matches!(result, Err(RecoveryError::InvalidToken)));

    let other = fx.repository().find_by_id(other_id).await.unwrap().unwrap();
    assert!(other.recovery_token.is_some());
}

#[tokio::test]
async fn test_blank_token_is_invalid() {
    let fx = Fixture::new().await;
    let result = fx.service.reset_with_token("", "newpassword1").await;
    assert!(matches!(result, Err(RecoveryError::InvalidToken)));
}

#[tokio::test]
async fn test_custom_policy_windows() {
    let pool = test_helpers::create_test_db().await.unwrap();
    test_helpers::insert_test_user(&pool, "Ana", "ana@example.com", "password123", true)
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::new(START));
    let mailer = Arc::new(RecordingEmailService::new());
    let service = RecoveryService::new(
        Arc::new(SqliteUserRepository::new(pool)),
        mailer.clone(),
        clock.clone(),
        BASE_URL,
    )
    .with_policy(RecoveryPolicy::new(
        Duration::from_secs(10),
        Duration::from_secs(60),
    ));

    let issued = service.request_recovery("ana@example.com").await.unwrap();
    assert_eq!(issued.expires_at, START + 60_000);

    clock.advance(Duration::from_secs(11));
    service.request_recovery("ana@example.com").await.unwrap();
    let token = test_helpers::token_from_email(&mailer.last().unwrap()).unwrap();

    clock.advance(Duration::from_secs(61));
    let result = service.reset_with_token(&token, "newpassword1").await;
    assert!(matches!(result, Err(RecoveryError::ExpiredToken)));
}
