use tracing::info;

use crate::{
    auth::{
        gate::{Admin, Target, UserAction},
        repo_types::User,
    },
    error::{ApiError, ApiResult},
    store::UserStore,
};

/// All accounts, newest first. The `Admin` proof is the capability check.
pub async fn list_users<S>(_admin: &Admin<'_>, store: &S) -> ApiResult<Vec<User>>
where
    S: UserStore + ?Sized,
{
    Ok(store.list_users().await?)
}

pub async fn delete_user<S>(store: &S, target: Target) -> ApiResult<()>
where
    S: UserStore + ?Sized,
{
    debug_assert_eq!(target.action(), UserAction::Delete);
    let user = target.user();
    if !store.delete_user(&user.id).await? {
        return Err(ApiError::UserNotFound);
    }
    info!(user_id = %user.id, email = %user.email, "user deleted");
    Ok(())
}
