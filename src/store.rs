use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    auth::repo_types::{Session, Status, User},
    catalog::repo_types::{AppEntry, Category},
    config::DatabaseConfig,
    error::StoreError,
};

/// Users and their credentials. Emails passed in are expected to be normalized already.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    /// Marks the owner of `token` verified and clears the token in one step.
    /// Returns `None` when no user holds the token.
    async fn redeem_verification_token(&self, token: &str) -> Result<Option<User>, StoreError>;
    /// Returns `false` when no such user exists.
    async fn set_password_hash(&self, id: &str, hash: &str) -> Result<bool, StoreError>;
    async fn set_status(&self, id: &str, status: Status) -> Result<bool, StoreError>;
    /// Newest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn delete_user(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;
    async fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError>;
    async fn delete_session(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Newest first.
    async fn list_apps(&self) -> Result<Vec<AppEntry>, StoreError>;
    async fn count_apps(&self) -> Result<i64, StoreError>;
    async fn insert_app(&self, app: &AppEntry) -> Result<(), StoreError>;
    async fn update_app(&self, app: &AppEntry) -> Result<bool, StoreError>;
    async fn delete_app(&self, id: &str) -> Result<bool, StoreError>;
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the name is taken.
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;
    /// Create-if-missing; an existing category is left untouched.
    async fn ensure_category(&self, name: &str) -> Result<(), StoreError>;
    async fn delete_category(&self, name: &str) -> Result<bool, StoreError>;
}

/// Everything a request handler may touch. Implemented by [`PgStore`] and
/// [`crate::memory::MemoryStore`].
#[async_trait]
pub trait Store: UserStore + SessionStore + CatalogStore {
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let url = cfg.url.as_deref().context("DATABASE_URL not configured")?;
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .connect(url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
