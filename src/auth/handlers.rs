use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ForgotRequest, ForgotResponse, LoginRequest, LoginResponse,
            MeResponse, MessageResponse, PublicUser, SignupRequest, VerifyQuery,
        },
        lifecycle, recovery,
        session::{self, CurrentUser},
    },
    error::{ApiError, ApiResult},
    extract::{Json, Query},
    mail::OutboundMail,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/forgot", post(forgot))
        .route("/auth/verify", get(verify))
        .route("/auth/change-password", post(change_password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = lifecycle::signup(
        state.store.as_ref(),
        &payload.name,
        &payload.email,
        &payload.password,
    )
    .await?;

    // Best effort: the account exists whether or not the mail goes out.
    if let Some(token) = user.verification_token.as_deref() {
        let verify_url = format!(
            "{}/api/auth/verify?token={}",
            state.config.public_base_url, token
        );
        if let Err(e) = state
            .mailer
            .send(OutboundMail::verification(&user.email, &verify_url))
            .await
        {
            warn!(user_id = %user.id, error = %e, "failed to send verification email");
        }
    }

    Ok(Json(MessageResponse::with_message(
        "Account created. Check your email to verify before admin approval.",
    )))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = lifecycle::authenticate(state.store.as_ref(), &payload.email, &payload.password).await?;
    let token = session::establish(&state, &user).await?;
    Ok(Json(LoginResponse {
        success: true,
        user: PublicUser::from(&user),
        token,
    }))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    session::clear(&state, &current).await?;
    Ok(Json(MessageResponse::ok()))
}

#[instrument(skip_all)]
pub async fn me(current: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user: PublicUser::from(&current.user),
    })
}

#[instrument(skip(state, payload))]
pub async fn forgot(
    State(state): State<AppState>,
    Json(payload): Json<ForgotRequest>,
) -> ApiResult<Json<ForgotResponse>> {
    let temp_password = recovery::request_reset(&state, &payload.email).await?;
    let message = if temp_password.is_some() {
        "Temporary password issued."
    } else {
        "Temporary password sent to your email."
    };
    Ok(Json(ForgotResponse {
        success: true,
        message: message.into(),
        temp_password,
    }))
}

/// Answers in plain text; the link is opened from an email client.
#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, ApiError>,
) -> (StatusCode, &'static str) {
    let Ok(Query(q)) = query else {
        return (StatusCode::BAD_REQUEST, "Missing token");
    };
    match lifecycle::verify_email(state.store.as_ref(), &q.token).await {
        Ok(_) => (
            StatusCode::OK,
            "Email verified. You can now log in (admin approval may still be required).",
        ),
        Err(ApiError::Validation(_)) => (StatusCode::BAD_REQUEST, "Missing token"),
        Err(ApiError::InvalidToken) => (StatusCode::NOT_FOUND, "Invalid token"),
        Err(e) => {
            error!(error = %e, "verification failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Verification failed")
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    recovery::change_password(
        state.store.as_ref(),
        &payload.email,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse::ok()))
}
