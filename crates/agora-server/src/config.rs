use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::warn;

use agora_api::auth::SessionSettings;
use agora_token::keys::{KEY_SIZE, generate_key};

/// Value shipped in sample env files. Never a real key.
const PLACEHOLDER_KEY: &str = "********************************";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub token_key: Vec<u8>,
    pub production: bool,
    pub session: SessionSettings,
}

impl Config {
    /// Read `AGORA_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| get(name).unwrap_or_else(|| default.into());

        let production = var("AGORA_ENV", "development").eq_ignore_ascii_case("production");

        let port: u16 = var("AGORA_PORT", "8080")
            .parse()
            .context("AGORA_PORT must be a port number")?;
        let access_minutes: u64 = var("AGORA_ACCESS_TOKEN_MINUTES", "15")
            .parse()
            .context("AGORA_ACCESS_TOKEN_MINUTES must be a whole number")?;
        let refresh_hours: u64 = var("AGORA_REFRESH_TOKEN_HOURS", "24")
            .parse()
            .context("AGORA_REFRESH_TOKEN_HOURS must be a whole number")?;
        if access_minutes == 0 || refresh_hours == 0 {
            bail!("token lifetimes must be positive");
        }

        Ok(Self {
            host: var("AGORA_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(var("AGORA_DB_PATH", "agora.db")),
            token_key: token_key(get("AGORA_TOKEN_KEY"), production)?,
            production,
            session: SessionSettings {
                access_token_ttl: Duration::from_secs(access_minutes * 60),
                refresh_token_ttl: Duration::from_secs(refresh_hours * 60 * 60),
                access_cookie_path: var("AGORA_ACCESS_COOKIE_PATH", "/api"),
                refresh_cookie_path: var("AGORA_REFRESH_COOKIE_PATH", "/api/refresh"),
                username_cookie_path: var("AGORA_USERNAME_COOKIE_PATH", "/"),
                secure_cookies: production,
            },
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

fn token_key(raw: Option<String>, production: bool) -> Result<Vec<u8>> {
    match raw.filter(|k| !k.is_empty() && k != PLACEHOLDER_KEY) {
        Some(key) if key.len() == KEY_SIZE => Ok(key.into_bytes()),
        Some(key) => bail!("AGORA_TOKEN_KEY must be exactly {} bytes, got {}", KEY_SIZE, key.len()),
        None if production => bail!("AGORA_TOKEN_KEY must be set in production"),
        None => {
            warn!("AGORA_TOKEN_KEY not set, using an ephemeral key; sessions will not survive a restart");
            Ok(generate_key().to_vec())
        }
    }
}
