use std::env;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512};
use time::Duration;
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer,
};
use tower_sessions_sqlx_store::SqliteStore;

use super::app::Environment;

pub type SessionLayer = SessionManagerLayer<SqliteStore, SignedCookie>;

pub const SESSION_TABLE: &str = "sessions";

/// Cookie settings for the customer session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secure: bool,
    pub same_site: SameSite,
    pub idle_timeout: Duration,
    pub cookie_name: &'static str,
}

impl SessionConfig {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => SessionConfig {
                secure: true,
                same_site: SameSite::Strict,
                idle_timeout: Duration::hours(2),
                cookie_name: "__Host-totalis",
            },
            Environment::Development => SessionConfig {
                secure: false,
                same_site: SameSite::Lax,
                idle_timeout: Duration::days(7),
                cookie_name: "totalis_session",
            },
        }
    }

    pub fn from_env() -> Self {
        Self::for_environment(Environment::from_env())
    }

    pub fn create_layer(&self, store: SqliteStore) -> SessionLayer {
        SessionManagerLayer::new(store)
            .with_secure(self.secure)
            .with_http_only(true)
            .with_same_site(self.same_site)
            .with_name(self.cookie_name)
            .with_expiry(Expiry::OnInactivity(self.idle_timeout))
            .with_signed(signing_key(env::var("SESSION_SECRET").ok().as_deref()))
    }
}

/// Refuses to start a production server without HTTPS and a strong
/// `SESSION_SECRET`.
pub fn validate_production_config(environment: Environment) -> anyhow::Result<()> {
    if !environment.is_production() {
        return Ok(());
    }

    let force_https = env::var("FORCE_HTTPS")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true"))
        .unwrap_or(false);
    if !force_https {
        bail!("production requires HTTPS; set FORCE_HTTPS=true");
    }

    let secret = env::var("SESSION_SECRET").context("SESSION_SECRET must be set in production")?;
    if secret_bytes(&secret).len() < 64 {
        bail!("SESSION_SECRET must be at least 64 bytes in production");
    }

    let lowered = secret.to_ascii_lowercase();
    if ["example", "changeme", "default"]
        .iter()
        .any(|weak| lowered.contains(weak))
    {
        bail!("SESSION_SECRET looks like a placeholder value");
    }

    Ok(())
}

fn signing_key(secret: Option<&str>) -> Key {
    match secret.filter(|s| !s.is_empty()) {
        Some(secret) => {
            let bytes = secret_bytes(secret);
            if bytes.len() >= 64 {
                Key::from(&bytes[..64])
            } else {
                Key::from(Sha512::digest(&bytes).as_slice())
            }
        }
        None => {
            tracing::warn!("SESSION_SECRET not set; using an ephemeral signing key");
            Key::generate()
        }
    }
}

/// Accepts either base64 or raw text.
fn secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}
