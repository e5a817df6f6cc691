use async_trait::async_trait;

use crate::{
    auth::repo_types::{Session, Status, User, UserRow},
    error::StoreError,
    store::{PgStore, SessionStore, UserStore},
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, status, is_verified, verification_token, created_at";

fn into_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(StoreError::Unreachable)
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, status, is_verified, verification_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.verified)
        .bind(&user.verification_token)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find a user by email, ignoring case.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1) LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_user).transpose()
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_user).transpose()
    }

    async fn redeem_verification_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        // Single statement so two concurrent redemptions cannot both succeed.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET is_verified = TRUE, verification_token = NULL
             WHERE verification_token = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_user).transpose()
    }

    async fn set_password_hash(&self, id: &str, hash: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_status(&self, id: &str, status: Status) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_user).collect()
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO sessions (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(&session.user_id)
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
