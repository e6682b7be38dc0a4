use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::config::{AppConfig, StorageBackend};
use crate::users::{memory::MemoryUserStore, pg::PgUserStore, store::UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
}

impl FromRef<AppState> for Arc<dyn UserStore> {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let jwt = JwtKeys::new(&config.jwt)?;

        let users = match config.storage {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres backend")?;
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        Ok(Self::from_parts(config, jwt, users))
    }

    pub fn from_parts(config: Arc<AppConfig>, jwt: JwtKeys, users: Arc<dyn UserStore>) -> Self {
        Self { config, jwt, users }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(
            Arc::new(MemoryUserStore::new()),
            std::time::Duration::from_secs(10),
        )
    }

    #[cfg(test)]
    pub fn fake_with(users: Arc<dyn UserStore>, request_timeout: std::time::Duration) -> Self {
        use crate::config::JwtConfig;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            storage: StorageBackend::Memory,
            database_url: None,
            request_timeout,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                ttl_minutes: 5,
            },
        });
        let jwt = JwtKeys::new(&config.jwt).expect("test jwt config is valid");
        Self::from_parts(config, jwt, users)
    }
}
