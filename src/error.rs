use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Storage-layer failure, independent of the backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Conflict(&'static str),
    #[error("storage unreachable: {0}")]
    Unreachable(#[from] anyhow::Error),
}

/// Unique constraints whose violation means "already taken". Any other
/// unique violation (primary keys, verification tokens) is an internal fault.
const EMAIL_KEY: &str = "users_email_lower_key";
const CATEGORY_KEY: &str = "categories_name_key";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                match db.constraint() {
                    Some(EMAIL_KEY) => return StoreError::Conflict("email"),
                    Some(CATEGORY_KEY) => return StoreError::Conflict("category"),
                    _ => {}
                }
            }
        }
        StoreError::Unreachable(anyhow::Error::new(e))
    }
}

/// Request-level error. Every variant renders as `{success:false, message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("User not found.")]
    UserNotFound,
    #[error("Invalid password.")]
    InvalidCredentials,
    #[error("Email not verified. Please check your inbox.")]
    EmailNotVerified,
    #[error("Account is pending approval.")]
    PendingApproval,
    #[error("Account has been deactivated.")]
    AccountDeactivated,
    #[error("{0}")]
    Conflict(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("{0}")]
    InvalidOperation(String),
    #[error("{0}")]
    Validation(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Service unavailable")]
    Unreachable(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::EmailNotVerified
            | ApiError::PendingApproval
            | ApiError::AccountDeactivated
            | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::UserNotFound | ApiError::InvalidToken | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        ApiError::InvalidOperation(msg.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict("category") => ApiError::Conflict("Category already exists.".into()),
            StoreError::Conflict(_) => ApiError::Conflict("Email already exists.".into()),
            StoreError::Unreachable(e) => ApiError::Unreachable(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Unreachable(cause) = &self {
            error!(error = %cause, "request failed on a storage or transport dependency");
        }
        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
