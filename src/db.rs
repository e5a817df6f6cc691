use anyhow::Context;
use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        password::hash_password,
        repo_types::{Role, Status, User},
    },
    catalog::repo_types::AppEntry,
    error::StoreError,
    state::AppState,
};

pub const ROOT_ADMIN_ID: &str = "admin-001";

pub const DEFAULT_CATEGORIES: [&str; 5] = ["Work", "Social", "Development", "Media", "Other"];

const DEFAULT_APPS: [(&str, &str, &str, &str); 3] = [
    ("GitHub", "https://github.com", "Where the world builds software.", "Development"),
    ("YouTube", "https://youtube.com", "Enjoy the videos and music you love.", "Media"),
    ("Gmail", "https://mail.google.com", "Secure, smart, and easy to use email.", "Work"),
];

/// Idempotent boot-time seeding: root admin, default categories, sample apps.
pub async fn seed_defaults(state: &AppState) -> anyhow::Result<()> {
    let store = state.store.as_ref();
    let cfg = &state.config;

    for name in DEFAULT_CATEGORIES {
        store
            .ensure_category(name)
            .await
            .with_context(|| format!("seed category {name}"))?;
    }

    if store.count_apps().await.context("count apps")? == 0 {
        let seeded_at = OffsetDateTime::now_utc();
        for (i, (name, url, description, category)) in DEFAULT_APPS.iter().enumerate() {
            let slug = name.to_lowercase();
            store
                .insert_app(&AppEntry {
                    id: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    url: url.to_string(),
                    description: description.to_string(),
                    image_url: Some(format!("https://picsum.photos/seed/{slug}/400/200")),
                    category: category.to_string(),
                    created_at: seeded_at - Duration::seconds(i as i64),
                })
                .await
                .with_context(|| format!("seed app {name}"))?;
        }
        info!(count = DEFAULT_APPS.len(), "seeded sample apps");
    }

    if store
        .find_user_by_email(&cfg.root_admin_email)
        .await
        .context("look up root admin")?
        .is_none()
    {
        let admin = User {
            id: ROOT_ADMIN_ID.to_string(),
            name: "System Admin".into(),
            email: cfg.root_admin_email.clone(),
            password_hash: hash_password(&cfg.root_admin_password)?,
            role: Role::Admin,
            status: Status::Approved,
            verified: true,
            verification_token: None,
            created_at: OffsetDateTime::now_utc(),
        };
        match store.insert_user(&admin).await {
            Ok(()) => info!(email = %cfg.root_admin_email, "seeded root admin"),
            // another instance seeded it first
            Err(StoreError::Conflict("email")) => {}
            Err(e) => return Err(e).context("seed root admin"),
        }
    }

    let root = store
        .find_user_by_email(&cfg.root_admin_email)
        .await
        .context("look up root admin")?;
    match root {
        Some(user) if user.role == Role::Admin => Ok(()),
        Some(_) => anyhow::bail!(
            "ROOT_ADMIN_EMAIL {} belongs to a non-admin account",
            cfg.root_admin_email
        ),
        None => anyhow::bail!("root admin {} is missing after seeding", cfg.root_admin_email),
    }
}
