//! Password-recovery token lifecycle.
//!
//! Decides whether a user may be sent a new recovery link, mints tokens with a
//! bounded lifetime and checks a presented token at reset time. Everything in
//! here is pure over millisecond timestamps; persistence and delivery live in
//! [`crate::services::recovery_service`].

use std::time::Duration;

use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::clock::Millis;

/// Minimum spacing between two issued recovery tokens for the same user.
pub const COOLDOWN: Duration = Duration::from_secs(40);

/// How long a freshly minted recovery token stays valid.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceDecision {
    Allow,
    Deny { seconds_remaining: u64 },
}

impl IssuanceDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, IssuanceDecision::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: Millis,
    pub expires_at: Millis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("Invalid recovery token")]
    Invalid,
    #[error("Recovery token expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    cooldown_ms: i64,
    lifetime_ms: i64,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::new(COOLDOWN, TOKEN_LIFETIME)
    }
}

fn to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl RecoveryPolicy {
    pub fn new(cooldown: Duration, token_lifetime: Duration) -> Self {
        Self {
            cooldown_ms: to_millis(cooldown),
            lifetime_ms: to_millis(token_lifetime),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms as u64)
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms as u64)
    }

    /// Cooldown check for records that only carry an expiry: the prior
    /// issuance time is taken to be `existing_expiry - token_lifetime`.
    pub fn evaluate_issuance(
        &self,
        existing_expiry: Option<Millis>,
        now: Millis,
    ) -> IssuanceDecision {
        let estimated_issuance =
            existing_expiry.map(|expiry| expiry.saturating_sub(self.lifetime_ms));
        self.evaluate_since(estimated_issuance, now)
    }

    /// Cooldown check against an explicitly stored issuance time.
    ///
    /// A clock that moved backwards (`now` before `last_issued_at`) counts as
    /// zero elapsed time, so the wait reported never exceeds the cooldown.
    pub fn evaluate_since(&self, last_issued_at: Option<Millis>, now: Millis) -> IssuanceDecision {
        let Some(issued_at) = last_issued_at else {
            return IssuanceDecision::Allow;
        };

        let elapsed = now.saturating_sub(issued_at).max(0);
        if elapsed >= self.cooldown_ms {
            return IssuanceDecision::Allow;
        }

        let remaining = (self.cooldown_ms - elapsed) as u64;
        IssuanceDecision::Deny {
            seconds_remaining: remaining.div_ceil(1000),
        }
    }

    pub fn issue_token(&self, now: Millis) -> IssuedToken {
        IssuedToken {
            token: generate_token(),
            issued_at: now,
            expires_at: now.saturating_add(self.lifetime_ms),
        }
    }

    /// Checks a presented token against the stored one. On `Ok` the caller
    /// must clear the stored token in the same write that changes the
    /// credential.
    pub fn validate_and_consume(
        &self,
        stored_token: Option<&str>,
        stored_expiry: Option<Millis>,
        presented: &str,
        now: Millis,
    ) -> Result<(), TokenRejection> {
        let stored = stored_token.ok_or(TokenRejection::Invalid)?;

        if !bool::from(stored.as_bytes().ct_eq(presented.as_bytes())) {
            return Err(TokenRejection::Invalid);
        }

        match stored_expiry {
            Some(expiry) if now <= expiry => Ok(()),
            _ => Err(TokenRejection::Expired),
        }
    }
}

/// 256 bits from the OS generator, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
