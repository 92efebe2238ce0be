//! Password hashing (Argon2id, PHC string format).

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use archivum_core::{DomainError, DomainResult};

pub fn hash_password(password: &str) -> DomainResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::backend(format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> DomainResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| DomainError::invalid_parameter(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("archive-me").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("archive-me", &hash).unwrap());
        assert!(!verify_password("archive-you", &hash).unwrap());
        assert_ne!(hash, hash_password("archive-me").unwrap());
    }

    #[test]
    fn malformed_hash_is_rejected() {
        assert!(verify_password("x", "plaintext").is_err());
    }
}
