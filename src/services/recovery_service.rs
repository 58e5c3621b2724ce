use crate::auth::password;
use crate::clock::{Clock, Millis};
use crate::models::user::User;
use crate::recovery::{IssuanceDecision, RecoveryPolicy, TokenRejection};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::{templates, EmailService};
use crate::services::user_service::normalize_email;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Email not registered")]
    UnknownUser,
    #[error("Recovery requested too soon; retry in {seconds_remaining}s")]
    RateLimited { seconds_remaining: u64 },
    #[error("Invalid recovery token")]
    InvalidToken,
    #[error("Recovery token expired")]
    ExpiredToken,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

impl From<TokenRejection> for RecoveryError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Invalid => RecoveryError::InvalidToken,
            TokenRejection::Expired => RecoveryError::ExpiredToken,
        }
    }
}

/// Result of an approved recovery request. The token itself is only ever
/// sent by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryIssued {
    pub user_id: i64,
    pub expires_at: Millis,
    pub delivered: bool,
}

pub struct RecoveryService {
    repository: Arc<dyn UserRepository>,
    email_service: Arc<dyn EmailService>,
    clock: Arc<dyn Clock>,
    policy: RecoveryPolicy,
    base_url: String,
}

impl RecoveryService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            email_service,
            clock,
            policy: RecoveryPolicy::default(),
            base_url: base_url.into(),
        }
    }

    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    fn decide(&self, user: &User, now: Millis) -> IssuanceDecision {
        match user.recovery_issued_at {
            Some(issued_at) => self.policy.evaluate_since(Some(issued_at), now),
            // rows written before issuance time was stored only carry an expiry
            None => self.policy.evaluate_issuance(user.recovery_expires_at, now),
        }
    }

    /// Issues a recovery token for `email` and mails the reset link.
    ///
    /// The token is committed before delivery is attempted; a failed send is
    /// logged and reported as `delivered: false` without rolling it back.
    pub async fn request_recovery(&self, email: &str) -> Result<RecoveryIssued, RecoveryError> {
        let email = normalize_email(email);
        let user = self
            .repository
            .find_by_email(&email)
            .await?
            .ok_or(RecoveryError::UnknownUser)?;

        let now = self.clock.now_millis();
        if let IssuanceDecision::Deny { seconds_remaining } = self.decide(&user, now) {
            tracing::info!(user_id = user.id, seconds_remaining, "recovery request throttled");
            return Err(RecoveryError::RateLimited { seconds_remaining });
        }

        let issued = self.policy.issue_token(now);
        match self
            .repository
            .update_recovery_fields(
                user.id,
                &issued.token,
                issued.issued_at,
                issued.expires_at,
                user.recovery_issued_at,
            )
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => {
                // a concurrent request issued first; report its cooldown
                let current = self
                    .repository
                    .find_by_id(user.id)
                    .await?
                    .ok_or(RecoveryError::UnknownUser)?;
                let seconds_remaining = match self.decide(&current, now) {
                    IssuanceDecision::Deny { seconds_remaining } => seconds_remaining,
                    IssuanceDecision::Allow => self.policy.cooldown().as_secs(),
                };
                tracing::warn!(user_id = user.id, "concurrent recovery request lost the race");
                return Err(RecoveryError::RateLimited { seconds_remaining });
            }
            Err(RepositoryError::NotFound) => return Err(RecoveryError::UnknownUser),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = user.id, expires_at = issued.expires_at, "recovery token issued");

        let message = templates::recovery_email(&self.base_url, &user.email, &issued.token);
        let delivered = match self.email_service.send_email(message).await {
            Ok(()) => {
                tracing::info!(user_id = user.id, "📧 recovery email sent");
                true
            }
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "❌ failed to send recovery email");
                false
            }
        };

        Ok(RecoveryIssued {
            user_id: user.id,
            expires_at: issued.expires_at,
            delivered,
        })
    }

    /// Replaces the password of the account holding `token` and consumes the
    /// token in the same write.
    pub async fn reset_with_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), RecoveryError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RecoveryError::InvalidToken);
        }

        let user = self
            .repository
            .find_by_recovery_token(token)
            .await?
            .ok_or(RecoveryError::InvalidToken)?;

        let now = self.clock.now_millis();
        if let Err(rejection) = self.policy.validate_and_consume(
            user.recovery_token.as_deref(),
            user.recovery_expires_at,
            token,
            now,
        ) {
            tracing::info!(user_id = user.id, reason = %rejection, "recovery token rejected");
            return Err(rejection.into());
        }

        if !password::is_strong_enough(new_password) {
            return Err(RecoveryError::WeakPassword);
        }

        let password_hash = password::hash_password(new_password)
            .map_err(|e| RecoveryError::HashingError(e.to_string()))?;

        match self
            .repository
            .reset_password(user.id, token, &password_hash)
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::Conflict) | Err(RepositoryError::NotFound) => {
                tracing::warn!(user_id = user.id, "recovery token consumed concurrently");
                return Err(RecoveryError::InvalidToken);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = user.id, "password reset with recovery token");
        Ok(())
    }

    /// Clears recovery tokens whose expiry has passed.
    pub async fn purge_expired(&self) -> Result<u64, RecoveryError> {
        let now = self.clock.now_millis();
        let purged = self.repository.purge_expired_recovery_tokens(now).await?;
        if purged > 0 {
            tracing::info!(purged, "expired recovery tokens cleared");
        }
        Ok(purged)
    }
}

pub fn spawn_purge_task(service: Arc<RecoveryService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = service.purge_expired().await {
                tracing::error!(error = %e, "recovery token purge failed");
            }
        }
    })
}
