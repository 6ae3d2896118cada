//! Password hashing via bcrypt and credential verification.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::AuthError;

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// One-way password hashing with per-call salt and constant-time comparison.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// `Ok(false)` on mismatch; `Err` when the stored hash cannot be parsed.
    fn verify(&self, hash: &str, candidate: &str) -> Result<bool, AuthError>;
}

/// [`PasswordHasher`] backed by bcrypt.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new() -> Self {
        Self { cost: BCRYPT_COST }
    }

    /// Use a custom cost (bcrypt accepts 4..=31).
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
    }

    fn verify(&self, hash: &str, candidate: &str) -> Result<bool, AuthError> {
        bcrypt::verify(candidate, hash)
            .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
    }
}

/// The submitted password does not match the stored hash.
#[derive(Debug, Error)]
#[error("password does not match")]
pub struct Mismatch;

/// Checks submitted passwords against stored hashes.
///
/// A corrupt stored hash is reported exactly like a wrong password.
#[derive(Clone)]
pub struct CredentialVerifier {
    hasher: Arc<dyn PasswordHasher>,
}

impl CredentialVerifier {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }

    pub fn verify(&self, stored_hash: &str, candidate: &str) -> Result<(), Mismatch> {
        match self.hasher.verify(stored_hash, candidate) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Mismatch),
            Err(e) => {
                debug!(error = %e, "stored hash could not be compared");
                Err(Mismatch)
            }
        }
    }

    /// Hash a new password with the underlying hasher.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        self.hasher.hash(password)
    }
}
