//! Session manager. A session is a server-side record plus a signed bearer
//! token naming it. Sessions have no expiry; `clear` deletes the record and
//! the token stops resolving.

use std::collections::HashSet;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    lifecycle,
    repo_types::{Session, User},
};
use crate::{
    config::SessionConfig,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Bearer token payload. No `exp`: sessions are not time-bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub sid: String, // session record id
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            issuer,
            audience,
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
        }
    }
}

impl SessionKeys {
    pub fn sign(&self, user_id: &str, session_id: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            iat: OffsetDateTime::now_utc().unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(%user_id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["sub".to_string(), "aud".to_string()]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Records a new session for an authenticated user and returns its bearer token.
/// Earlier sessions of other clients are left alone.
pub async fn establish(state: &AppState, user: &User) -> ApiResult<String> {
    let session = Session {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        created_at: OffsetDateTime::now_utc(),
    };
    state.store.insert_session(&session).await?;
    let token = SessionKeys::from_ref(state)
        .sign(&user.id, &session.id)
        .map_err(ApiError::Unreachable)?;
    info!(user_id = %user.id, "session established");
    Ok(token)
}

/// Resolves a bearer token to the live user behind it.
pub async fn current(state: &AppState, token: &str) -> ApiResult<CurrentUser> {
    let claims = SessionKeys::from_ref(state).verify(token).map_err(|_| {
        warn!("invalid session token");
        ApiError::Unauthenticated
    })?;

    let session = state
        .store
        .find_session(&claims.sid)
        .await?
        .filter(|s| s.user_id == claims.sub)
        .ok_or(ApiError::Unauthenticated)?;

    let user = state
        .store
        .find_user_by_id(&session.user_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    // An admin may have deactivated the account since login.
    lifecycle::ensure_active(&user)?;

    Ok(CurrentUser {
        user,
        session_id: session.id,
    })
}

pub async fn clear(state: &AppState, current: &CurrentUser) -> ApiResult<()> {
    state.store.delete_session(&current.session_id).await?;
    info!(user_id = %current.user.id, "session cleared");
    Ok(())
}

/// Identity of the caller, resolved per request from the bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        current(state, token).await
    }
}
