use anyhow::Context;
use std::{net::SocketAddr, path::PathBuf, time::Duration};

pub const PRODUCTION_BASE_URL: &str = "https://totalishops.com";
pub const DEFAULT_SUPPORT_EMAIL: &str = "atencionalcliente@totalishops.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match std::env::var("ENVIRONMENT").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Runtime settings read from the process environment (after `dotenvy`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub static_dir: PathBuf,
    pub support_email: String,
    pub purge_interval: Duration,
    pub environment: Environment,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid PORT: {raw}"))?,
            Err(_) => 3000,
        };
        let environment = Environment::from_env();

        let base_url = match std::env::var("BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ if environment.is_production() => PRODUCTION_BASE_URL.to_string(),
            _ => format!("http://localhost:{port}"),
        };

        let purge_interval = std::env::var("PURGE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            static_dir: std::env::var("STATIC_DIR")
                .unwrap_or_else(|_| "public".into())
                .into(),
            support_email: std::env::var("SUPPORT_EMAIL")
                .unwrap_or_else(|_| DEFAULT_SUPPORT_EMAIL.into()),
            purge_interval,
            environment,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
