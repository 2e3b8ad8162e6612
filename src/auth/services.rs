use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    password::hash_password,
    repo::UserRepo,
    repo_types::{NewUser, Role, User},
};
use crate::{config::AdminSeed, error::AppError};

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates, hashes and stores a new account.
pub async fn register_user(
    users: &dyn UserRepo,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    let name = name.trim();
    let email = normalize_email(email);

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Name, email and password are required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(password)?;
    let user = users
        .create(NewUser {
            email,
            password_hash,
            name: name.to_string(),
            role,
        })
        .await?;
    Ok(user)
}

/// Creates the configured admin account unless its email is already taken.
pub async fn seed_admin(users: &dyn UserRepo, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = normalize_email(&seed.email);
    if let Some(existing) = users.find_by_email(&email).await? {
        if existing.role != Role::Admin {
            warn!(email = %email, "admin seed email belongs to a non-admin account");
        }
        return Ok(());
    }
    let admin = register_user(users, &seed.name, &email, &seed.password, Role::Admin)
        .await
        .map_err(|e| anyhow::anyhow!("seed admin: {e}"))?;
    info!(user_id = %admin.id, email = %admin.email, "admin account seeded");
    Ok(())
}
