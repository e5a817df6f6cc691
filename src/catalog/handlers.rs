use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Router,
};
use tracing::instrument;

use super::{
    dto::{AppForm, AppResponse, AppsResponse, CategoriesResponse, CategoryForm},
    services,
};
use crate::{
    auth::{dto::MessageResponse, gate::require_admin, session::CurrentUser},
    error::ApiResult,
    extract::{Json, Path},
    state::AppState,
};

/// Reads are public; every write resolves the caller and requires admin.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/apps", get(list_apps).post(create_app))
        .route("/apps/:id", put(update_app).delete(delete_app))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:name", delete(delete_category))
}

#[instrument(skip(state))]
pub async fn list_apps(State(state): State<AppState>) -> ApiResult<Json<AppsResponse>> {
    let apps = state.store.list_apps().await?;
    Ok(Json(AppsResponse { success: true, apps }))
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<CategoriesResponse>> {
    let categories = services::list_category_names(state.store.as_ref()).await?;
    Ok(Json(CategoriesResponse {
        success: true,
        categories,
    }))
}

#[instrument(skip(state, current, form), fields(caller = %current.user.id))]
pub async fn create_app(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<AppForm>,
) -> ApiResult<(StatusCode, Json<AppResponse>)> {
    let admin = require_admin(&current.user)?;
    let app = services::create_app(&admin, state.store.as_ref(), form).await?;
    Ok((StatusCode::CREATED, Json(AppResponse { success: true, app })))
}

#[instrument(skip(state, current, form), fields(caller = %current.user.id))]
pub async fn update_app(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(form): Json<AppForm>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = require_admin(&current.user)?;
    services::update_app(&admin, state.store.as_ref(), &id, form).await?;
    Ok(Json(MessageResponse::ok()))
}

#[instrument(skip(state, current), fields(caller = %current.user.id))]
pub async fn delete_app(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = require_admin(&current.user)?;
    services::delete_app(&admin, state.store.as_ref(), &id).await?;
    Ok(Json(MessageResponse::ok()))
}

#[instrument(skip(state, current, form), fields(caller = %current.user.id))]
pub async fn create_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<CategoryForm>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let admin = require_admin(&current.user)?;
    let category = services::create_category(&admin, state.store.as_ref(), &form.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::with_message(format!("Category {} created", category.name))),
    ))
}

#[instrument(skip(state, current), fields(caller = %current.user.id))]
pub async fn delete_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(name): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = require_admin(&current.user)?;
    services::delete_category(&admin, state.store.as_ref(), &name).await?;
    Ok(Json(MessageResponse::ok()))
}
