//! Four-digit recovery codes for password reset.
//!
//! A code is stored hashed under `recovery_code:<user_id>` with its own TTL.
//! Issuing a new code replaces the old one; a redeemed code is deleted.

use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, rng};
use tracing::debug;

use super::AuthError;
use super::password::CredentialVerifier;
use crate::config::AuthConfig;
use crate::kv::{KeyValueStore, within};

const RECOVERY_PREFIX: &str = "recovery_code:";

/// Generate a random zero-padded 4-digit code.
pub fn generate_recovery_code() -> String {
    let code: u16 = rng().random_range(0..10_000);
    format!("{code:04}")
}

/// Hashed, expiring recovery codes keyed by user ID.
#[derive(Clone)]
pub struct RecoveryCodes {
    store: Arc<dyn KeyValueStore>,
    verifier: CredentialVerifier,
    ttl: Duration,
    timeout: Duration,
}

impl RecoveryCodes {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        verifier: CredentialVerifier,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            verifier,
            ttl: config.recovery_code_ttl,
            timeout: config.store_timeout,
        }
    }

    /// Store a fresh code for `user_id` and return it in plain text for delivery.
    pub async fn issue(&self, user_id: u64) -> Result<String, AuthError> {
        let code = generate_recovery_code();
        let hash = self.verifier.hash(&code)?;
        within(
            self.timeout,
            self.store.set(&recovery_key(user_id), &hash, self.ttl),
        )
        .await?;
        Ok(code)
    }

    /// Consume the live code for `user_id` if `code` matches it.
    pub async fn redeem(&self, user_id: u64, code: &str) -> Result<bool, AuthError> {
        let key = recovery_key(user_id);
        let Some(hash) = within(self.timeout, self.store.get(&key)).await? else {
            debug!(user_id, "no live recovery code");
            return Ok(false);
        };
        if self.verifier.verify(&hash, code).is_err() {
            return Ok(false);
        }
        within(self.timeout, self.store.delete(&[key.as_str()])).await?;
        Ok(true)
    }
}

fn recovery_key(user_id: u64) -> String {
    format!("{RECOVERY_PREFIX}{user_id}")
}
