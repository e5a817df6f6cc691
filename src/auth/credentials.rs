//! Credential store: email lookup, password check, hash replacement.
//! Plaintext passwords pass through here and are never logged.

use tracing::{debug, error};

use super::{
    password::{self, normalize_email},
    repo_types::User,
};
use crate::{
    error::{ApiError, ApiResult},
    store::UserStore,
};

/// Case-insensitive lookup; at most one user matches.
pub async fn find_by_email<S>(store: &S, email: &str) -> ApiResult<Option<User>>
where
    S: UserStore + ?Sized,
{
    Ok(store.find_user_by_email(&normalize_email(email)).await?)
}

pub fn verify_password(user: &User, plain: &str) -> ApiResult<bool> {
    password::verify_password(plain, &user.password_hash).map_err(|e| {
        error!(user_id = %user.id, "stored password hash is unreadable");
        ApiError::Unreachable(e)
    })
}

/// Hashes `plain` and overwrites the stored hash of `user_id`.
pub async fn set_password_hash<S>(store: &S, user_id: &str, plain: &str) -> ApiResult<()>
where
    S: UserStore + ?Sized,
{
    if plain.is_empty() {
        return Err(ApiError::validation("Password must not be empty"));
    }
    let hash = password::hash_password(plain).map_err(ApiError::Unreachable)?;
    if !store.set_password_hash(user_id, &hash).await? {
        return Err(ApiError::UserNotFound);
    }
    debug!(%user_id, "password hash replaced");
    Ok(())
}
