//! In-process backend for offline/demo runs and unit tests.
//!
//! Mirrors the postgres backend's contract, including unique constraints and a
//! bounded connection pool: every operation checks out one of `max_connections`
//! permits and returns it when the guard drops.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{RwLock, Semaphore, SemaphorePermit};
use uuid::Uuid;

use crate::{
    auth::repo_types::{Session, Status, User},
    catalog::repo_types::{AppEntry, Category},
    config::DatabaseConfig,
    error::StoreError,
    store::{CatalogStore, SessionStore, Store, UserStore},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: HashMap<String, Session>,
    apps: Vec<AppEntry>,
    categories: Vec<Category>,
}

pub struct MemoryStore {
    pool: Semaphore,
    acquire_timeout: Duration,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(cfg: &DatabaseConfig) -> Self {
        let max = cfg.max_connections.max(1) as usize;
        Self {
            pool: Semaphore::new(max),
            acquire_timeout: Duration::from_secs(cfg.acquire_timeout_secs),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Permits not currently checked out.
    #[cfg(test)]
    fn idle_connections(&self) -> usize {
        self.pool.available_permits()
    }

    pub(crate) async fn checkout(&self) -> Result<SemaphorePermit<'_>, StoreError> {
        match tokio::time::timeout(self.acquire_timeout, self.pool.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(e)) => Err(StoreError::Unreachable(anyhow::Error::new(e))),
            Err(_) => Err(StoreError::Unreachable(anyhow::anyhow!(
                "pool timed out while waiting for an open connection"
            ))),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Unreachable(anyhow::anyhow!(
                "duplicate user id {}",
                user.id
            )));
        }
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Conflict("email"));
        }
        t.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let _conn = self.checkout().await?;
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let _conn = self.checkout().await?;
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn redeem_verification_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        let Some(user) = t
            .users
            .iter_mut()
            .find(|u| u.verification_token.as_deref() == Some(token))
        else {
            return Ok(None);
        };
        user.verified = true;
        user.verification_token = None;
        Ok(Some(user.clone()))
    }

    async fn set_password_hash(&self, id: &str, hash: &str) -> Result<bool, StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.password_hash = hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_status(&self, id: &str, status: Status) -> Result<bool, StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let _conn = self.checkout().await?;
        let mut users = self.tables.read().await.users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        let removed = t.users.len() != before;
        if removed {
            t.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        if !t.users.iter().any(|u| u.id == session.user_id) {
            return Err(StoreError::Unreachable(anyhow::anyhow!(
                "session references unknown user {}",
                session.user_id
            )));
        }
        t.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let _conn = self.checkout().await?;
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let _conn = self.checkout().await?;
        Ok(self.tables.write().await.sessions.remove(id).is_some())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_apps(&self) -> Result<Vec<AppEntry>, StoreError> {
        let _conn = self.checkout().await?;
        let mut apps = self.tables.read().await.apps.clone();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn count_apps(&self) -> Result<i64, StoreError> {
        let _conn = self.checkout().await?;
        Ok(self.tables.read().await.apps.len() as i64)
    }

    async fn insert_app(&self, app: &AppEntry) -> Result<(), StoreError> {
        let _conn = self.checkout().await?;
        self.tables.write().await.apps.push(app.clone());
        Ok(())
    }

    async fn update_app(&self, app: &AppEntry) -> Result<bool, StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        match t.apps.iter_mut().find(|a| a.id == app.id) {
            Some(existing) => {
                // created_at is immutable, as in the postgres backend
                let created_at = existing.created_at;
                *existing = AppEntry { created_at, ..app.clone() };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_app(&self, id: &str) -> Result<bool, StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        let before = t.apps.len();
        t.apps.retain(|a| a.id != id);
        Ok(t.apps.len() != before)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let _conn = self.checkout().await?;
        let mut cats = self.tables.read().await.categories.clone();
        cats.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(cats)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        if t.categories.iter().any(|c| c.name == category.name) {
            return Err(StoreError::Conflict("category"));
        }
        t.categories.push(category.clone());
        Ok(())
    }

    async fn ensure_category(&self, name: &str) -> Result<(), StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        if !t.categories.iter().any(|c| c.name == name) {
            t.categories.push(Category {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                created_at: OffsetDateTime::now_utc(),
            });
        }
        Ok(())
    }

    async fn delete_category(&self, name: &str) -> Result<bool, StoreError> {
        let _conn = self.checkout().await?;
        let mut t = self.tables.write().await;
        let before = t.categories.len();
        t.categories.retain(|c| c.name != name);
        Ok(t.categories.len() != before)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let _conn = self.checkout().await?;
        Ok(())
    }
}
