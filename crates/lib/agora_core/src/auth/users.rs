//! User store interface consumed by the login flow.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::{User, UserCredentials};

/// User store errors. A missing user is `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("User store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("Corrupt user row: {0}")]
    Corrupt(String),
}

/// Durable source of registered identities.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, UserStoreError>;

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, UserStoreError>;

    /// User and stored hash by ID, for flows that re-check the current password.
    async fn find_credentials_by_id(
        &self,
        id: u64,
    ) -> Result<Option<UserCredentials>, UserStoreError>;

    /// Replace the stored hash. Returns `false` if no such user exists.
    async fn update_password(&self, id: u64, password_hash: &str) -> Result<bool, UserStoreError>;
}
