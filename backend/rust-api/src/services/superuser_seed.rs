use crate::config::Config;
use crate::models::user::{User, UserRole};
use anyhow::{Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use mongodb::{bson::doc, Database};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Seed file payload for the initial super admin account
#[derive(Debug, Deserialize)]
pub struct SuperuserSeed {
    pub email: String,
    #[serde(default = "default_superuser_name")]
    pub full_name: String,
    pub password: String,
}

fn default_superuser_name() -> String {
    "Super Admin".to_string()
}

/// Create the super admin from the configured seed file, if any.
/// A no-op when the file is absent or the account already exists.
pub async fn bootstrap(config: &Config, mongo: &Database) -> Result<()> {
    let path = match &config.superuser_seed_file {
        Some(path) if !path.is_empty() => Path::new(path),
        _ => {
            tracing::debug!("No superuser seed file configured, skipping bootstrap");
            return Ok(());
        }
    };

    if !path.exists() {
        tracing::warn!("Superuser seed file not found: {}", path.display());
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .await
        .context("Failed to read superuser seed file")?;
    let seed: SuperuserSeed =
        serde_json::from_str(&raw).context("Failed to parse superuser seed file")?;

    let users = mongo.collection::<User>("users");
    let existing = users
        .find_one(doc! { "email": &seed.email })
        .await
        .context("Failed to check for existing superuser")?;

    if existing.is_some() {
        tracing::debug!("Superuser {} already exists, skipping seed", seed.email);
        return Ok(());
    }

    let password_hash =
        hash(&seed.password, DEFAULT_COST).context("Failed to hash superuser password")?;

    let now = Utc::now();
    let user = User {
        id: None,
        email: seed.email.clone(),
        password_hash,
        full_name: seed.full_name,
        role: UserRole::SuperAdmin,
        university_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };

    users
        .insert_one(&user)
        .await
        .context("Failed to insert seeded superuser")?;

    tracing::info!("Seeded super admin account: {}", seed.email);
    Ok(())
}
