use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use argon2::{Argon2, Params};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(String);

/// One-way salted hashing of passwords.
///
/// `verify` must compare in constant time with respect to the stored hash;
/// callers never compare plaintext or hash strings themselves.
pub trait CredentialHasher: Send + Sync {
    /// Produce a self-describing hash string with a fresh random salt.
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// Whether `password` matches `stored`. A malformed `stored` value never matches.
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Argon2id with PHC-string output.
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Custom cost parameters for new hashes. Verification always uses the
    /// parameters recorded in the stored hash.
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError(e.to_string()))
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        // password-hash compares the computed output in constant time
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    Argon2Hasher::with_params(Params::new(8, 1, 1, None).unwrap())
}
