use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use super::repo_types::User;
use crate::error::ApiError;

/// Hashes a signup password for storage. An empty password is a client error.
pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    if plain.is_empty() {
        warn!("empty password");
        return Err(ApiError::Validation("Password is required".into()));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow!("hashing signup password: {e}"))?;
    Ok(hash.to_string())
}

/// Whether `plain` is `user`'s password. A stored hash that cannot be parsed
/// never matches; it is logged against the user so the row can be repaired.
pub fn check_password(user: &User, plain: &str) -> bool {
    let parsed = match PasswordHash::new(&user.password_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(user_id = %user.id, error = %e, "stored password hash is unreadable");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}
