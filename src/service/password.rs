//! Argon2 password hashing and verification.
//!
//! Verification compares through the password-hash machinery, which is
//! constant-time with respect to the candidate password.

use crate::error::ApiError;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Unexpected(format!("password hash: {}", e)))
}

pub fn verify(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let h = hash("longpw123").unwrap();
        assert_ne!(h, "longpw123");
        assert!(verify("longpw123", &h));
        assert!(!verify("wrongpw123", &h));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify("anything", "not-a-phc-string"));
        assert!(!verify("anything", ""));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash("longpw123").unwrap();
        let b = hash("longpw123").unwrap();
        assert_ne!(a, b);
    }
}
