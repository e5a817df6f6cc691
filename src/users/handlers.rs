use axum::{
    extract::State,
    routing::{delete, get, patch, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{AdminPasswordRequest, StatusRequest, UsersResponse},
    services,
};
use crate::{
    auth::{
        dto::{MessageResponse, PublicUser},
        gate::{require_admin, UserAction},
        lifecycle, recovery,
        repo_types::Status,
        session::CurrentUser,
    },
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/status", patch(set_status))
        .route("/users/:id/password", post(set_password))
}

#[instrument(skip(state, current), fields(caller = %current.user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<UsersResponse>> {
    let admin = require_admin(&current.user)?;
    let users = services::list_users(&admin, state.store.as_ref()).await?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.iter().map(PublicUser::from).collect(),
    }))
}

#[instrument(skip(state, current, payload), fields(caller = %current.user.id))]
pub async fn set_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = require_admin(&current.user)?;
    let status: Status = payload
        .status
        .parse()
        .map_err(|_| ApiError::validation("Invalid status"))?;
    let target = admin
        .authorize(state.store.as_ref(), &state.config, &id, UserAction::SetStatus)
        .await?;
    lifecycle::set_status(state.store.as_ref(), &target, status).await?;
    Ok(Json(MessageResponse::ok()))
}

#[instrument(skip(state, current, payload), fields(caller = %current.user.id))]
pub async fn set_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<AdminPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = require_admin(&current.user)?;
    if payload.new_password.is_empty() {
        return Err(ApiError::validation("Missing new password"));
    }
    let target = admin
        .authorize(state.store.as_ref(), &state.config, &id, UserAction::SetPassword)
        .await?;
    recovery::admin_set_password(state.store.as_ref(), &target, &payload.new_password).await?;
    Ok(Json(MessageResponse::ok()))
}

#[instrument(skip(state, current), fields(caller = %current.user.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = require_admin(&current.user)?;
    let target = admin
        .authorize(state.store.as_ref(), &state.config, &id, UserAction::Delete)
        .await?;
    services::delete_user(state.store.as_ref(), target).await?;
    Ok(Json(MessageResponse::ok()))
}
