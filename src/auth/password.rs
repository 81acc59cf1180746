use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HashConfig;

const DUMMY_PASSWORD: &str = "accountd-timing-equalizer";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password is not a valid hash: {0}")]
    MalformedHash(String),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// An Argon2 PHC string. The repository only ever stores this type, and it
/// can only be built by hashing or by reading a stored row, so a value is
/// never hashed twice.
#[derive(Clone, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HashedPassword(..)")
    }
}

/// Salted, adaptive one-way hashing of account passwords.
#[derive(Clone)]
pub struct CredentialStore {
    argon2: Argon2<'static>,
    dummy: HashedPassword,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(cfg: &HashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy = hash_with(&argon2, DUMMY_PASSWORD)?;
        Ok(Self { argon2, dummy })
    }

    /// Hashes with a fresh salt, off the async executor.
    pub async fn hash(&self, plain: String) -> Result<HashedPassword, PasswordError> {
        let argon2 = self.argon2.clone();
        tokio::task::spawn_blocking(move || hash_with(&argon2, &plain)).await?
    }

    /// `Ok(false)` on mismatch. Errors only when the stored value cannot be parsed.
    pub async fn verify(&self, plain: String, hash: &HashedPassword) -> Result<bool, PasswordError> {
        let argon2 = self.argon2.clone();
        let hash = hash.clone();
        tokio::task::spawn_blocking(move || verify_with(&argon2, &plain, &hash)).await?
    }

    /// Runs a full verification against a throwaway hash and discards the
    /// result. Used where there is no stored hash to check against.
    pub async fn verify_dummy(&self, plain: String) -> Result<(), PasswordError> {
        self.verify(plain, &self.dummy).await.map(|_| ())
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> Result<HashedPassword, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e.to_string())
        })?
        .to_string();
    Ok(HashedPassword(hash))
}

fn verify_with(argon2: &Argon2<'_>, plain: &str, hash: &HashedPassword) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash.as_str()).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::MalformedHash(e.to_string())
    })?;
    Ok(argon2.verify_password(plain.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
pub(crate) fn test_store() -> CredentialStore {
    CredentialStore::new(&HashConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("test params are valid")
}
