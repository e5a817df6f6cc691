use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::{
    dto::AppForm,
    repo_types::{AppEntry, Category},
};
use crate::{
    auth::gate::Admin,
    error::{ApiError, ApiResult},
    store::CatalogStore,
};

/// Shown when an app is saved without a description.
pub const FALLBACK_DESCRIPTION: &str = "A useful web application.";

fn clean_form(form: AppForm) -> ApiResult<AppForm> {
    let name = form.name.trim().to_string();
    let url = form.url.trim().to_string();
    let category = form.category.trim().to_string();
    if name.is_empty() || url.is_empty() || category.is_empty() {
        return Err(ApiError::validation("Name, URL and category are required"));
    }
    let description = match form.description.trim() {
        "" => FALLBACK_DESCRIPTION.to_string(),
        d => d.to_string(),
    };
    let image_url = form
        .image_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    Ok(AppForm {
        name,
        url,
        description,
        image_url,
        category,
    })
}

pub async fn create_app<S>(admin: &Admin<'_>, store: &S, form: AppForm) -> ApiResult<AppEntry>
where
    S: CatalogStore + ?Sized,
{
    let form = clean_form(form)?;
    store.ensure_category(&form.category).await?;
    let app = AppEntry {
        id: Uuid::new_v4().to_string(),
        name: form.name,
        url: form.url,
        description: form.description,
        image_url: form.image_url,
        category: form.category,
        created_at: OffsetDateTime::now_utc(),
    };
    store.insert_app(&app).await?;
    info!(app_id = %app.id, by = %admin.caller().id, "app created");
    Ok(app)
}

pub async fn update_app<S>(admin: &Admin<'_>, store: &S, id: &str, form: AppForm) -> ApiResult<()>
where
    S: CatalogStore + ?Sized,
{
    let form = clean_form(form)?;
    store.ensure_category(&form.category).await?;
    let app = AppEntry {
        id: id.to_string(),
        name: form.name,
        url: form.url,
        description: form.description,
        image_url: form.image_url,
        category: form.category,
        created_at: OffsetDateTime::now_utc(), // ignored on update
    };
    if !store.update_app(&app).await? {
        return Err(ApiError::NotFound("App"));
    }
    info!(app_id = %id, by = %admin.caller().id, "app updated");
    Ok(())
}

pub async fn delete_app<S>(admin: &Admin<'_>, store: &S, id: &str) -> ApiResult<()>
where
    S: CatalogStore + ?Sized,
{
    if !store.delete_app(id).await? {
        return Err(ApiError::NotFound("App"));
    }
    info!(app_id = %id, by = %admin.caller().id, "app deleted");
    Ok(())
}

pub async fn list_category_names<S>(store: &S) -> ApiResult<Vec<String>>
where
    S: CatalogStore + ?Sized,
{
    Ok(store
        .list_categories()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect())
}

pub async fn create_category<S>(admin: &Admin<'_>, store: &S, name: &str) -> ApiResult<Category>
where
    S: CatalogStore + ?Sized,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Category name is required"));
    }
    let category = Category {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    store.insert_category(&category).await?;
    info!(category = %category.name, by = %admin.caller().id, "category created");
    Ok(category)
}

/// Apps keep their category tag; the UI lists them under it until edited.
pub async fn delete_category<S>(admin: &Admin<'_>, store: &S, name: &str) -> ApiResult<()>
where
    S: CatalogStore + ?Sized,
{
    if !store.delete_category(name.trim()).await? {
        return Err(ApiError::NotFound("Category"));
    }
    info!(category = %name, by = %admin.caller().id, "category deleted");
    Ok(())
}
