use serde::{Deserialize, Serialize};

use super::repo_types::AppEntry;

/// Create and update share one body; `id` comes from the path on update.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppForm {
    pub name: String,
    pub url: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AppsResponse {
    pub success: bool,
    pub apps: Vec<AppEntry>,
}

#[derive(Debug, Serialize)]
pub struct AppResponse {
    pub success: bool,
    pub app: AppEntry,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub success: bool,
    pub categories: Vec<String>,
}
