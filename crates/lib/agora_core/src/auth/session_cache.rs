//! Cache-aside session store.
//!
//! Holds the last issued token per identity so repeat logins skip credential
//! verification. Registered identities also keep a JSON snapshot of the user.
//! Entries are trusted until their TTL lapses and are never re-verified
//! against the signing secret here; only [`TokenIssuer::validate`] is
//! authoritative outside the login path.
//!
//! [`TokenIssuer::validate`]: super::jwt::TokenIssuer::validate

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::AuthConfig;
use crate::kv::{KeyValueStore, KvError, within};
use crate::models::auth::{IdentityKey, User};

const TOKEN_PREFIX: &str = "auth_token:";
const USER_PREFIX: &str = "user_data:";
const ANONYMOUS_PREFIX: &str = "anonymous_token:";

/// A cached token and, for registered identities, who it was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCacheEntry {
    pub token: String,
    pub identity: Option<User>,
}

/// Token cache keyed by identity, backed by the expiring key-value store.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl SessionCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout,
        }
    }

    /// Live entry for `key`, if any.
    ///
    /// A registered token without its identity snapshot reads as a miss.
    pub async fn lookup(&self, key: IdentityKey<'_>) -> Result<Option<SessionCacheEntry>, KvError> {
        let (token_key, user_key) = keys(key);
        let Some(token) = within(self.timeout, self.store.get(&token_key)).await? else {
            return Ok(None);
        };
        let Some(user_key) = user_key else {
            return Ok(Some(SessionCacheEntry {
                token,
                identity: None,
            }));
        };
        match within(self.timeout, self.store.get(&user_key)).await? {
            Some(json) => Ok(Some(SessionCacheEntry {
                token,
                identity: Some(serde_json::from_str(&json)?),
            })),
            None => {
                debug!(key = %token_key, "cached token has no identity snapshot");
                Ok(None)
            }
        }
    }

    /// Overwrite the entry for `key`.
    pub async fn store(
        &self,
        key: IdentityKey<'_>,
        entry: &SessionCacheEntry,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let (token_key, user_key) = keys(key);
        if let (Some(user_key), Some(identity)) = (user_key, &entry.identity) {
            let snapshot = serde_json::to_string(identity)?;
            within(self.timeout, self.store.set(&user_key, &snapshot, ttl)).await?;
        }
        within(self.timeout, self.store.set(&token_key, &entry.token, ttl)).await
    }

    /// Drop the token and identity snapshot for `key`.
    pub async fn invalidate(&self, key: IdentityKey<'_>) -> Result<(), KvError> {
        let (token_key, user_key) = keys(key);
        let mut doomed = vec![token_key.as_str()];
        if let Some(user_key) = &user_key {
            doomed.push(user_key.as_str());
        }
        within(self.timeout, self.store.delete(&doomed)).await?;
        Ok(())
    }
}

fn keys(key: IdentityKey<'_>) -> (String, Option<String>) {
    match key {
        IdentityKey::Registered(email) => (
            format!("{TOKEN_PREFIX}{email}"),
            Some(format!("{USER_PREFIX}{email}")),
        ),
        IdentityKey::Anonymous(caller) => (format!("{ANONYMOUS_PREFIX}{caller}"), None),
    }
}
