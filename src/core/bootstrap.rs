use anyhow::Context;
use uuid::Uuid;

use crate::core::{security, state::AppState, time::primitive_now_utc};
use crate::repositories;

/// Ensure the configured platform admin exists so a fresh deployment can be
/// administered before any other user is provisioned.
pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_username.is_empty() || admin.first_superuser_password.is_empty() {
        tracing::debug!("First superuser not configured; skipping bootstrap");
        return Ok(());
    }

    let existing =
        repositories::users::find_by_username(state.db(), &admin.first_superuser_username)
            .await
            .context("Failed to look up first superuser")?;

    if existing.is_some() {
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)
        .context("Failed to hash first superuser password")?;
    let now = primitive_now_utc();

    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &admin.first_superuser_username,
            hashed_password: &hashed_password,
            full_name: "Platform Admin",
            surname: "Admin",
            is_active: true,
            is_platform_admin: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .context("Failed to create first superuser")?;

    tracing::info!(username = %admin.first_superuser_username, "Created first superuser");

    Ok(())
}
