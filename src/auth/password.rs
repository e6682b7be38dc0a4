use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum HashingError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
    #[error("hashing task aborted: {0}")]
    Aborted(String),
}

pub fn hash_password(plain: &str) -> Result<String, HashingError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashingError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// A mismatch is `Ok(false)`; only an unparseable stored hash is an error.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, HashingError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        HashingError::MalformedHash(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(plain: String) -> Result<String, HashingError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| HashingError::Aborted(e.to_string()))?
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(plain: String, hash: String) -> Result<bool, HashingError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| HashingError::Aborted(e.to_string()))?
}

lazy_static! {
    static ref DUMMY_HASH: Option<String> = hash_password("roster-unknown-user").ok();
}

/// Spends one verification's worth of work against a throwaway hash so a
/// login for an unknown user costs the same as one with a wrong password.
pub async fn verify_dummy_blocking(plain: String) {
    if let Some(hash) = DUMMY_HASH.clone() {
        let _ = verify_password_blocking(plain, hash).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("same"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(matches!(err, HashingError::MalformedHash(_)));
    }

    #[test]
    fn stored_hash_does_not_verify_against_itself() {
        let hash = hash_password("secret1").unwrap();
        assert!(!verify_password(&hash, &hash).unwrap());
    }

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        let hash = DUMMY_HASH.as_deref().expect("dummy hash should be computed");
        assert!(PasswordHash::new(hash).is_ok());
        assert!(!verify_password("secret1", hash).unwrap());
    }

    #[tokio::test]
    async fn blocking_wrappers_agree() {
        let hash = hash_password_blocking("secret1".into()).await.unwrap();
        assert!(verify_password_blocking("secret1".into(), hash.clone()).await.unwrap());
        assert!(!verify_password_blocking("secret2".into(), hash).await.unwrap());
    }
}
