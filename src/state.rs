use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::db;
use crate::error::ApiError;
use crate::resources::{Collection, ResourceRegistry};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub resources: Arc<ResourceRegistry>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;
        Self::from_parts(db, config, ResourceRegistry::with_defaults()?).await
    }

    /// Migrates the users table, creates every registered resource table and
    /// derives the token keys from `config`.
    pub async fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        resources: ResourceRegistry,
    ) -> anyhow::Result<Self> {
        db::migrate(&db).await?;
        resources.ensure_tables(&db).await?;
        let jwt = Arc::new(JwtKeys::from_config(&config.jwt));
        Ok(Self {
            db,
            config,
            jwt,
            resources: Arc::new(resources),
        })
    }

    /// Unknown resource names behave like unmatched routes.
    pub fn collection(&self, name: &str) -> Result<&Collection, ApiError> {
        self.resources.get(name).ok_or(ApiError::RouteNotFound)
    }

    #[cfg(test)]
    pub async fn for_tests() -> Self {
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: None,
            },
        });
        let db = db::connect(&config).await.expect("in-memory pool");
        let resources = ResourceRegistry::with_defaults().expect("default resources");
        Self::from_parts(db, config, resources)
            .await
            .expect("test state")
    }
}
