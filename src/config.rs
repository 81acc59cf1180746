use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: u64,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Full URL; wins over the individual parts when set.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return url.parse().context("parse DATABASE_URL");
        }
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub rate_limit: RateLimitConfig,
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").ok(),
            host: std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".into()),
            port: env_parse("DB_PORT").unwrap_or(5432),
            username: std::env::var("DB_USERNAME").unwrap_or_else(|_| "postgres".into()),
            password: std::env::var("DB_PASSWORD").unwrap_or_default(),
            name: std::env::var("DB_NAME").unwrap_or_else(|_| "accounts".into()),
            max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
        };

        let ttl = match std::env::var("JWT_EXPIRES_IN") {
            Ok(raw) => parse_duration(&raw)
                .with_context(|| format!("invalid JWT_EXPIRES_IN {raw:?}"))?,
            Err(_) => Duration::from_secs(7 * 24 * 60 * 60),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accountd".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accountd-users".into()),
            ttl_seconds: ttl.as_secs(),
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_parse("HASH_MEMORY_KIB").unwrap_or(defaults.memory_kib),
            iterations: env_parse("HASH_ITERATIONS").unwrap_or(defaults.iterations),
            parallelism: env_parse("HASH_PARALLELISM").unwrap_or(defaults.parallelism),
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: env_parse("RATE_LIMIT_MAX").unwrap_or(defaults.max_requests),
            window_seconds: env_parse("RATE_LIMIT_WINDOW_SECS").unwrap_or(defaults.window_seconds),
        };

        Ok(Self {
            database,
            jwt,
            hash,
            rate_limit,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Parses `"3600"`, `"45s"`, `"30m"`, `"12h"` or `"7d"`.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().context("duration must start with a number")?;
    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 60 * 60,
        "d" => value * 24 * 60 * 60,
        other => anyhow::bail!("unknown duration unit {other:?}"),
    };
    Ok(Duration::from_secs(secs))
}
