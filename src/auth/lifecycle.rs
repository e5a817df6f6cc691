//! Account lifecycle: signup, email verification, admin approval and the
//! login checks built on them.
//!
//! The state is derived from two independent columns, `verified` and
//! `status`. Verification never touches `status`, and approval never touches
//! `verified`.

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    credentials,
    gate::{Target, UserAction},
    password::{self, is_valid_email, normalize_email},
    repo_types::{Role, Status, User},
};
use crate::{
    error::{ApiError, ApiResult},
    store::UserStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Unverified,
    PendingApproval,
    Approved,
    Rejected,
}

impl AccountState {
    pub fn of(user: &User) -> Self {
        if !user.verified {
            return AccountState::Unverified;
        }
        match user.status {
            Status::Pending => AccountState::PendingApproval,
            Status::Approved => AccountState::Approved,
            Status::Rejected => AccountState::Rejected,
        }
    }
}

/// Login-time lifecycle checks, in order: verified, not pending, not rejected.
pub fn ensure_active(user: &User) -> ApiResult<()> {
    match AccountState::of(user) {
        AccountState::Unverified => Err(ApiError::EmailNotVerified),
        AccountState::PendingApproval => Err(ApiError::PendingApproval),
        AccountState::Rejected => Err(ApiError::AccountDeactivated),
        AccountState::Approved => Ok(()),
    }
}

/// Creates an unverified, pending `user` account carrying a fresh verification token.
pub async fn signup<S>(store: &S, name: &str, email: &str, plain_password: &str) -> ApiResult<User>
where
    S: UserStore + ?Sized,
{
    let name = name.trim();
    let email = normalize_email(email);
    if name.is_empty() || email.is_empty() || plain_password.is_empty() {
        return Err(ApiError::validation("Missing fields"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email,
        password_hash: password::hash_password(plain_password).map_err(ApiError::Unreachable)?,
        role: Role::User,
        status: Status::Pending,
        verified: false,
        verification_token: Some(password::generate_verification_token()),
        created_at: OffsetDateTime::now_utc(),
    };
    // The unique index decides duplicates; no pre-check.
    store.insert_user(&user).await?;
    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok(user)
}

/// Credential check first, lifecycle second. "Unknown email" and "wrong
/// password" stay distinguishable for client compatibility, which discloses
/// whether an address is registered.
pub async fn authenticate<S>(store: &S, email: &str, plain_password: &str) -> ApiResult<User>
where
    S: UserStore + ?Sized,
{
    if email.trim().is_empty() || plain_password.is_empty() {
        return Err(ApiError::validation("Missing credentials"));
    }

    let user = credentials::find_by_email(store, email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if !credentials::verify_password(&user, plain_password)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if let Err(e) = ensure_active(&user) {
        warn!(user_id = %user.id, state = ?AccountState::of(&user), "login refused by account state");
        return Err(e);
    }

    Ok(user)
}

/// Redeems a verification token. The token is cleared on success, so a second
/// redemption fails with `InvalidToken`.
pub async fn verify_email<S>(store: &S, token: &str) -> ApiResult<User>
where
    S: UserStore + ?Sized,
{
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::validation("Missing token"));
    }
    let user = store
        .redeem_verification_token(token)
        .await?
        .ok_or(ApiError::InvalidToken)?;
    info!(user_id = %user.id, "email verified");
    Ok(user)
}

/// Any status may move to any other.
pub async fn set_status<S>(store: &S, target: &Target, status: Status) -> ApiResult<()>
where
    S: UserStore + ?Sized,
{
    debug_assert_eq!(target.action(), UserAction::SetStatus);
    let user = target.user();
    if !store.set_status(&user.id, status).await? {
        return Err(ApiError::UserNotFound);
    }
    info!(user_id = %user.id, from = user.status.as_str(), to = status.as_str(), "status changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::gate::require_admin, db::ROOT_ADMIN_ID, state::AppState};

    async fn set_status_as_root(state: &AppState, user_id: &str, status: Status) {
        let root = state.store.find_user_by_id(ROOT_ADMIN_ID).await.unwrap().unwrap();
        let admin = require_admin(&root).unwrap();
        let target = admin
            .authorize(state.store.as_ref(), &state.config, user_id, UserAction::SetStatus)
            .await
            .unwrap();
        set_status(state.store.as_ref(), &target, status).await.unwrap();
    }

    #[tokio::test]
    async fn signup_creates_unverified_pending_user() {
        let state = AppState::fake().await;
        let user = signup(state.store.as_ref(), "Alice", "Alice@X.com", "pw1").await.unwrap();
        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, Status::Pending);
        assert!(!user.verified);
        assert!(user.verification_token.is_some());
        assert_eq!(AccountState::of(&user), AccountState::Unverified);
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts_without_a_second_row() {
        let state = AppState::fake().await;
        let store = state.store.as_ref();
        signup(store, "Alice", "alice@x.com", "pw1").await.unwrap();
        let err = signup(store, "Other Alice", "ALICE@x.com", "pw2").await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        let count = store
            .list_users()
            .await
            .unwrap()
            .iter()
            .filter(|u| u.email == "alice@x.com")
            .count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let state = AppState::fake().await;
        let store = state.store.as_ref();
        assert!(matches!(signup(store, "", "a@b.co", "pw").await, Err(ApiError::Validation(_))));
        assert!(matches!(signup(store, "A", "not-an-email", "pw").await, Err(ApiError::Validation(_))));
        assert!(matches!(signup(store, "A", "a@b.co", "").await, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn unverified_login_fails_for_every_status() {
        let state = AppState::fake().await;
        let store = state.store.as_ref();
        let user = signup(store, "Alice", "alice@x.com", "pw1").await.unwrap();
        for status in [Status::Pending, Status::Approved, Status::Rejected] {
            store.set_status(&user.id, status).await.unwrap();
            let err = authenticate(store, "alice@x.com", "pw1").await.unwrap_err();
            assert!(matches!(err, ApiError::EmailNotVerified), "{status:?}");
        }
    }

    #[tokio::test]
    async fn verified_login_follows_status() {
        let state = AppState::fake().await;
        let store = state.store.as_ref();
        let user = signup(store, "Alice", "alice@x.com", "pw1").await.unwrap();
        verify_email(store, user.verification_token.as_deref().unwrap()).await.unwrap();

        assert!(matches!(
            authenticate(store, "alice@x.com", "pw1").await,
            Err(ApiError::PendingApproval)
        ));
        set_status_as_root(&state, &user.id, Status::Rejected).await;
        assert!(matches!(
            authenticate(store, "alice@x.com", "pw1").await,
            Err(ApiError::AccountDeactivated)
        ));
        set_status_as_root(&state, &user.id, Status::Approved).await;
        assert!(matches!(
            authenticate(store, "alice@x.com", "wrong").await,
            Err(ApiError::InvalidCredentials)
        ));
        let ok = authenticate(store, "ALICE@x.com", "pw1").await.unwrap();
        assert_eq!(ok.id, user.id);
    }

    #[tokio::test]
    async fn credentials_are_checked_before_lifecycle() {
        let state = AppState::fake().await;
        let store = state.store.as_ref();
        signup(store, "Alice", "alice@x.com", "pw1").await.unwrap();
        assert!(matches!(
            authenticate(store, "nobody@x.com", "pw1").await,
            Err(ApiError::UserNotFound)
        ));
        // unverified, but the wrong password is reported first
        assert!(matches!(
            authenticate(store, "alice@x.com", "nope").await,
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn verification_token_is_single_use_and_leaves_status() {
        let state = AppState::fake().await;
        let store = state.store.as_ref();
        let user = signup(store, "Alice", "alice@x.com", "pw1").await.unwrap();
        let token = user.verification_token.clone().unwrap();

        let verified = verify_email(store, &token).await.unwrap();
        assert!(verified.verified);
        assert!(verified.verification_token.is_none());
        assert_eq!(verified.status, Status::Pending);

        assert!(matches!(verify_email(store, &token).await, Err(ApiError::InvalidToken)));
        assert!(matches!(verify_email(store, "bogus").await, Err(ApiError::InvalidToken)));
    }

    #[tokio::test]
    async fn status_changes_are_reversible() {
        let state = AppState::fake().await;
        let store = state.store.as_ref();
        let user = signup(store, "Alice", "alice@x.com", "pw1").await.unwrap();
        for status in [Status::Approved, Status::Rejected, Status::Approved, Status::Pending] {
            set_status_as_root(&state, &user.id, status).await;
            let now = store.find_user_by_id(&user.id).await.unwrap().unwrap();
            assert_eq!(now.status, status);
            assert!(!now.verified);
        }
    }
}
