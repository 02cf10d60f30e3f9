//! One-way hashing of feed passwords with Argon2id.

use crate::domain::model::Credential;
use crate::utils::error::{ImportError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// OWASP parameters: m=19456 KiB, t=2, p=1.
    pub fn new() -> Result<Self> {
        Self::with_params(19456, 2, 1)
    }

    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None).map_err(|e| {
            ImportError::HashError {
                message: format!("Invalid parameters: {e}"),
            }
        })?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ImportError::HashError {
                message: format!("Hashing failed: {e}"),
            })?;

        Ok(hash.to_string())
    }

    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Moves a credential to its stored form. Absent stays absent.
    pub fn seal(&self, credential: Credential) -> Result<Credential> {
        match credential {
            Credential::Plain(password) => Ok(Credential::Hashed(self.hash(&password)?)),
            other => Ok(other),
        }
    }
}
