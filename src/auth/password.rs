//! Password hashing and verification.
//!
//! New hashes are Argon2id. bcrypt hashes (`$2a$`, `$2b$`, `$2y$`) written by
//! earlier versions of the portal still verify and are replaced on next login.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::warn;

use crate::error::PortalError;

/// Hash a password, returning the PHC string (salt and parameters included).
pub fn hash_password(password: &str) -> Result<String, PortalError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortalError::Password(format!("failed to hash password: {e}")))
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Check a password against a stored hash. An unreadable hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if is_bcrypt(hash) {
        return bcrypt::verify(password, hash).unwrap_or_else(|e| {
            warn!(error = %e, "stored bcrypt hash is unreadable");
            false
        });
    }
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

/// Whether a verified hash should be replaced by a fresh Argon2id one.
pub fn needs_rehash(hash: &str) -> bool {
    !hash.starts_with("$argon2id$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("correct-horse-battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct-horse-battery", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!needs_rehash(&hash));
    }

    #[test]
    fn salts_differ() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn bcrypt_hashes_still_verify() {
        let legacy = bcrypt::hash("resident-pass", 4).unwrap();
        assert!(legacy.starts_with("$2"));
        assert!(verify_password("resident-pass", &legacy));
        assert!(!verify_password("other-pass", &legacy));
        assert!(needs_rehash(&legacy));
    }

    #[test]
    fn unreadable_hash_never_matches() {
        assert!(!verify_password("pw", "plaintext"));
        assert!(!verify_password("pw", "$2a$10$short"));
    }
}
