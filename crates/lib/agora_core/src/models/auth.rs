//! Authentication domain models.

use serde::{Deserialize, Serialize};

/// Registered user identity, as exposed to callers and cached after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// User together with the stored password hash (internal auth flows only).
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Fields for inserting a new user. `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub nick: String,
    pub email: String,
    pub password_hash: String,
}

/// Key under which per-identity login state is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey<'a> {
    /// Registered identity, keyed by email.
    Registered(&'a str),
    /// Anonymous identity, keyed by the caller (usually a network address).
    Anonymous(&'a str),
}

/// Validated token claims. Built once when a token is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClaims {
    Registered { user_id: u64, expires_at: i64 },
    Anonymous { expires_at: i64 },
}

impl TokenClaims {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, TokenClaims::Anonymous { .. })
    }

    /// Subject user ID; `0` for anonymous tokens.
    pub fn subject(&self) -> u64 {
        match self {
            TokenClaims::Registered { user_id, .. } => *user_id,
            TokenClaims::Anonymous { .. } => 0,
        }
    }

    /// Expiry as a unix timestamp.
    pub fn expires_at(&self) -> i64 {
        match self {
            TokenClaims::Registered { expires_at, .. } | TokenClaims::Anonymous { expires_at } => {
                *expires_at
            }
        }
    }
}

/// Result of a registered login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticated {
    pub id: u64,
    pub token: String,
}

/// Result of an anonymous login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousSession {
    pub token: String,
}
