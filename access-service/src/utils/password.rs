use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::fmt;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// Newtype for password hash
#[derive(Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for PasswordHashString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHashString([REDACTED])")
    }
}

/// One-way hash-and-compare collaborator used by the identity directory.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error>;

    /// `Ok(false)` means the password does not match; `Err` means the stored hash is unusable.
    fn verify(
        &self,
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<bool, anyhow::Error>;
}

/// Argon2id with a random salt embedded in the PHC string.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    fn verify(
        &self,
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<bool, anyhow::Error> {
        let parsed_hash = PasswordHash::new(password_hash.as_str())
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

        Ok(Argon2::default()
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = Password::new("mySecurePassword123");
        let hash = Argon2Hasher.hash(&password).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_verify_password_correct() {
        let password = Password::new("mySecurePassword123");
        let hash = Argon2Hasher.hash(&password).expect("Failed to hash password");

        assert!(Argon2Hasher.verify(&password, &hash).unwrap());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = Password::new("mySecurePassword123");
        let hash = Argon2Hasher.hash(&password).expect("Failed to hash password");

        let wrong_password = Password::new("wrongPassword");
        assert!(!Argon2Hasher.verify(&wrong_password, &hash).unwrap());
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = Password::new("mySecurePassword123");
        let hash1 = Argon2Hasher.hash(&password).expect("Failed to hash password");
        let hash2 = Argon2Hasher.hash(&password).expect("Failed to hash password");

        // Random salt
        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(Argon2Hasher.verify(&password, &hash1).unwrap());
        assert!(Argon2Hasher.verify(&password, &hash2).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        let password = Password::new("pw");
        let garbage = PasswordHashString::new("not-a-phc-string".to_string());
        assert!(Argon2Hasher.verify(&password, &garbage).is_err());
    }

    #[test]
    fn test_debug_never_shows_secrets() {
        let password = Password::new("hunter2");
        assert!(!format!("{:?}", password).contains("hunter2"));
    }
}
