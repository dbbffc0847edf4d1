use anyhow::{anyhow, Context};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;

use crate::{AppError, AppResult};

pub const MIN_PASSWORD_CHARS: usize = 8;

pub fn validate(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::invalid(format!("password must be at least {MIN_PASSWORD_CHARS} characters")));
    }
    Ok(())
}

/// Argon2id PHC string for `password`, with a fresh random salt.
pub fn hash(password: &str) -> AppResult<String> {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|err| anyhow!("encoding salt: {err}"))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("hashing password: {err}"))?;
    Ok(hash.to_string())
}

pub fn verify(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(err) => {
            tracing::error!(error = %err, "stored password hash is unreadable");
            false
        }
    }
}

/// Hashing is CPU-bound; keep it off the async workers.
pub async fn hash_blocking(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash(&password))
        .await
        .context("password hashing task")?
}

pub async fn verify_blocking(password: String, stored: String) -> AppResult<bool> {
    Ok(tokio::task::spawn_blocking(move || verify(&password, &stored))
        .await
        .context("password verification task")?)
}
