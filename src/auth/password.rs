use argon2::{
    password_hash::{Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    // Stand-in credential for unknown emails. None only if argon2 itself is broken.
    static ref DUMMY_HASH: Option<String> = hash_password("no-account-has-this-password")
        .map_err(|e| error!(error = %e, "could not build dummy password hash"))
        .ok();
}

pub fn is_long_enough(plain: &str) -> bool {
    plain.chars().count() >= MIN_PASSWORD_LEN
}

/// Salted argon2id PHC string for storage in `users.password`.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| anyhow::anyhow!("hashing account password: {e}"))
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash cannot be parsed.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is unreadable: {e}"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("verifying account password: {e}")),
    }
}

/// Spends one argon2 run so a login for an unknown email costs what a wrong password does.
pub fn verify_against_dummy(plain: &str) {
    match DUMMY_HASH.as_deref() {
        Some(stored) => {
            let _ = verify_password(plain, stored);
        }
        None => {
            error!("dummy password hash unavailable, hashing instead");
            let _ = hash_password(plain);
        }
    }
}
