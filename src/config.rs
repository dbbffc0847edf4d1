//! Server configuration loaded from environment variables.
//!
//! Everything except `JWT_SECRET` has a default suitable for local development.

use std::fmt;
use std::net::SocketAddr;

use anyhow::anyhow;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://gittogether.db?mode=rwc";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:8080", "http://localhost:5173"];

#[derive(Clone)]
pub struct Config {
    /// Env: `DATABASE_URL`
    pub database_url: String,

    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// HMAC secret for bearer tokens.
    /// Env: `JWT_SECRET` (required)
    pub jwt_secret: String,

    /// Env: `DB_MAX_CONNECTIONS`
    pub db_max_connections: u32,

    /// Env: `ALLOWED_ORIGINS`, comma separated.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(anyhow!("JWT_SECRET is not set, refusing to start without a token secret"))?;

        let http_addr = match lookup("HTTP_ADDR") {
            Some(addr) => addr.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %addr, "invalid HTTP_ADDR, using default");
                default_http_addr()
            }),
            None => default_http_addr(),
        };

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(n) => n.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %n, "invalid DB_MAX_CONNECTIONS, using default");
                16
            }),
            None => 16,
        };

        let allowed_origins = match lookup("ALLOWED_ORIGINS") {
            Some(origins) => origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.map(str::to_owned).to_vec(),
        };

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(DEFAULT_DATABASE_URL.to_owned()),
            http_addr,
            jwt_secret,
            db_max_connections,
            allowed_origins,
        })
    }
}

fn default_http_addr() -> SocketAddr {
    ([0, 0, 0, 0], 5000).into()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("http_addr", &self.http_addr)
            .field("jwt_secret", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}
