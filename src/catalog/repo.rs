use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    catalog::repo_types::{AppEntry, Category},
    error::StoreError,
    store::{CatalogStore, PgStore},
};

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_apps(&self) -> Result<Vec<AppEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AppEntry>(
            r#"
            SELECT id, name, url, description, image_url, category, created_at
              FROM apps
             ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_apps(&self) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM apps")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn insert_app(&self, app: &AppEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO apps (id, name, url, description, image_url, category, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&app.id)
        .bind(&app.name)
        .bind(&app.url)
        .bind(&app.description)
        .bind(&app.image_url)
        .bind(&app.category)
        .bind(app.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_app(&self, app: &AppEntry) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE apps
               SET name = $2, url = $3, description = $4, image_url = $5, category = $6
             WHERE id = $1
            "#,
        )
        .bind(&app.id)
        .bind(&app.name)
        .bind(&app.url)
        .bind(&app.description)
        .bind(&app.image_url)
        .bind(&app.category)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_app(&self, id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM apps WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at FROM categories ORDER BY created_at ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(&category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ensure_category(&self, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_category(&self, name: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM categories WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
