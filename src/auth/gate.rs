//! Authorization gate. Capabilities, not a role hierarchy: `is_admin` and
//! `is_self`. Checks run before any mutation, and the mutating operations
//! accept only the proofs produced here.

use tracing::warn;

use super::repo_types::{Role, User};
use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    store::UserStore,
};

/// Proof that the caller holds the admin capability.
#[derive(Debug, Clone, Copy)]
pub struct Admin<'a> {
    caller: &'a User,
}

/// What an admin intends to do with another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Delete,
    SetStatus,
    SetPassword,
}

impl UserAction {
    fn forbids_self(self) -> bool {
        matches!(self, UserAction::Delete | UserAction::SetStatus)
    }
}

/// A target account that passed every gate check for one action.
#[derive(Debug)]
pub struct Target {
    user: User,
    action: UserAction,
}

impl Target {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn action(&self) -> UserAction {
        self.action
    }
}

pub fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

pub fn is_self(caller: &User, target_id: &str) -> bool {
    caller.id == target_id
}

pub fn require_admin(caller: &User) -> ApiResult<Admin<'_>> {
    if !is_admin(caller) {
        warn!(user_id = %caller.id, "admin capability required");
        return Err(ApiError::Forbidden);
    }
    Ok(Admin { caller })
}

impl<'a> Admin<'a> {
    pub fn caller(&self) -> &'a User {
        self.caller
    }

    /// Loads `target_id` and refuses the root admin and, for destructive
    /// actions, the caller's own account.
    pub async fn authorize<S>(
        &self,
        store: &S,
        config: &AppConfig,
        target_id: &str,
        action: UserAction,
    ) -> ApiResult<Target>
    where
        S: UserStore + ?Sized,
    {
        let user = store
            .find_user_by_id(target_id)
            .await?
            .ok_or(ApiError::UserNotFound)?;

        if config.is_root_admin(&user.email) {
            warn!(caller = %self.caller.id, ?action, "attempt to modify the root admin");
            let msg = match action {
                UserAction::Delete => "Cannot delete root admin",
                UserAction::SetStatus | UserAction::SetPassword => "Cannot modify root admin",
            };
            return Err(ApiError::invalid_operation(msg));
        }

        if action.forbids_self() && is_self(self.caller, &user.id) {
            warn!(caller = %self.caller.id, ?action, "admin targeted own account");
            return Err(ApiError::invalid_operation(
                "You cannot delete or deactivate your own account",
            ));
        }

        Ok(Target { user, action })
    }
}
