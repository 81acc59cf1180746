use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::password::CredentialStore,
    config::AppConfig,
    rate_limit::RateLimiter,
    users::repo::{PgUserRepository, UserRepository},
};

/// Handles shared by every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub passwords: CredentialStore,
    pub limiter: RateLimiter,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(config.database.connect_options()?)
            .await
            .context("connect to database")?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        Self::from_parts(config, Arc::new(PgUserRepository::new(db)))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserRepository>) -> anyhow::Result<Self> {
        let passwords = CredentialStore::new(&config.hash).context("argon2 parameters")?;
        let limiter = RateLimiter::new(&config.rate_limit);
        Ok(Self {
            config,
            users,
            passwords,
            limiter,
        })
    }

    #[cfg(test)]
    pub fn fake(
        rate_limit: crate::config::RateLimitConfig,
    ) -> (Self, Arc<crate::users::memory::InMemoryUserRepository>) {
        use crate::config::{DatabaseConfig, HashConfig, JwtConfig};

        let config = Arc::new(AppConfig {
            database: DatabaseConfig {
                url: None,
                host: "localhost".into(),
                port: 5432,
                username: "postgres".into(),
                password: String::new(),
                name: "accounts".into(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_seconds: 3600,
            },
            hash: HashConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            rate_limit,
            frontend_url: "http://localhost:3000".into(),
        });
        let repo = Arc::new(crate::users::memory::InMemoryUserRepository::default());
        let state = Self::from_parts(config, repo.clone()).expect("test state");
        (state, repo)
    }
}
