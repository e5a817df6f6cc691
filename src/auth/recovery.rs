//! Password recovery and replacement. Every path ends in
//! [`credentials::set_password_hash`].

use tracing::{info, warn};

use super::{
    credentials,
    gate::{Target, UserAction},
    password::generate_temporary_password,
};
use crate::{
    error::{ApiError, ApiResult},
    mail::OutboundMail,
    state::AppState,
    store::UserStore,
};

/// Issues a temporary password for a verified account and mails it.
///
/// The plaintext is never stored. It is returned to the caller only when
/// inline delivery is enabled in config (development setups).
pub async fn request_reset(state: &AppState, email: &str) -> ApiResult<Option<String>> {
    if email.trim().is_empty() {
        return Err(ApiError::validation("Email required"));
    }
    let store = state.store.as_ref();
    let user = credentials::find_by_email(store, email)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    if !user.verified {
        return Err(ApiError::EmailNotVerified);
    }

    let inline = state.config.reset_inline_password;
    if !inline && !state.mailer.delivers() {
        warn!(user_id = %user.id, "reset requested but no mail transport is configured");
        return Err(ApiError::Unreachable(anyhow::anyhow!(
            "no mail transport configured for password reset"
        )));
    }

    let temp = generate_temporary_password();
    credentials::set_password_hash(store, &user.id, &temp).await?;
    info!(user_id = %user.id, "temporary password issued");

    if let Err(e) = state
        .mailer
        .send(OutboundMail::temporary_password(&user.email, &temp))
        .await
    {
        warn!(user_id = %user.id, error = %e, "reset mail dispatch failed");
        if !inline {
            // the user never saw the temporary password; keep the old one valid
            store.set_password_hash(&user.id, &user.password_hash).await?;
            return Err(ApiError::Unreachable(e));
        }
    }

    Ok(inline.then_some(temp))
}

/// Self-service change; the current password is the proof of identity.
/// Nothing is written unless it matches.
pub async fn change_password<S>(
    store: &S,
    email: &str,
    current_password: &str,
    new_password: &str,
) -> ApiResult<()>
where
    S: UserStore + ?Sized,
{
    if email.trim().is_empty() || current_password.is_empty() || new_password.is_empty() {
        return Err(ApiError::validation("Missing fields"));
    }
    let user = credentials::find_by_email(store, email)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    if !credentials::verify_password(&user, current_password)? {
        warn!(user_id = %user.id, "change password with wrong current password");
        return Err(ApiError::InvalidCredentials);
    }
    credentials::set_password_hash(store, &user.id, new_password).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

/// Admin-forced reset. The gate's [`Target`] stands in for the old password.
pub async fn admin_set_password<S>(store: &S, target: &Target, new_password: &str) -> ApiResult<()>
where
    S: UserStore + ?Sized,
{
    debug_assert_eq!(target.action(), UserAction::SetPassword);
    if new_password.is_empty() {
        return Err(ApiError::validation("Missing new password"));
    }
    credentials::set_password_hash(store, &target.user().id, new_password).await?;
    info!(user_id = %target.user().id, "password set by admin");
    Ok(())
}
