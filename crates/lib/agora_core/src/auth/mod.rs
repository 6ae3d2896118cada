//! Authentication and authorization logic.
//!
//! Token issuance and validation, password verification, the login-attempt
//! throttle, the session cache, recovery codes and the flows that compose them.

pub mod jwt;
pub mod login;
pub mod password;
pub mod queries;
pub mod recovery;
pub mod session_cache;
pub mod throttle;
pub mod users;

use http::StatusCode;
use thiserror::Error;

use crate::kv::KvError;
use users::UserStoreError;

pub use jwt::{TokenIssuer, bearer_token, resolve_jwt_secret};
pub use login::LoginService;
pub use password::{BcryptHasher, CredentialVerifier, PasswordHasher};
pub use recovery::RecoveryCodes;
pub use queries::PgUserStore;
pub use session_cache::{SessionCache, SessionCacheEntry};
pub use throttle::{LoginThrottle, ThrottleState};
pub use users::UserStore;

/// Authentication errors.
///
/// Unknown email and wrong password both surface as `InvalidCredentials`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many login attempts, try again later")]
    TooManyAttempts,

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token signing error: {0}")]
    Signing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status a transport layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::Signing(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<KvError> for AuthError {
    fn from(e: KvError) -> Self {
        AuthError::Internal(format!("key-value store: {e}"))
    }
}

impl From<UserStoreError> for AuthError {
    fn from(e: UserStoreError) -> Self {
        AuthError::Internal(format!("user store: {e}"))
    }
}
