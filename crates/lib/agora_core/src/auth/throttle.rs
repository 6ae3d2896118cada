//! Login-attempt throttle with temporary lockout.
//!
//! Per identity: `Clear → Accumulating(n) → Locked`. Failures are counted in
//! `login_attempts:<key>`, which expires one window after the latest failure.
//! Reaching the maximum writes `login_blocked:<key>` for the lockout period
//! and drops the counter. Both records expire on their own.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::kv::{KeyValueStore, KvError, within};

const ATTEMPTS_PREFIX: &str = "login_attempts:";
const LOCK_PREFIX: &str = "login_blocked:";

/// Throttle state after recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    Clear,
    Accumulating(u32),
    Locked,
}

/// Counts failed logins per identity key and locks the key out at the threshold.
#[derive(Clone)]
pub struct LoginThrottle {
    store: Arc<dyn KeyValueStore>,
    max_attempts: u32,
    window: Duration,
    lockout: Duration,
    timeout: Duration,
}

impl LoginThrottle {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_attempts,
            window: config.attempt_window,
            lockout: config.lockout,
            timeout: config.store_timeout,
        }
    }

    /// Whether a live lock exists for `key`.
    pub async fn is_locked(&self, key: &str) -> Result<bool, KvError> {
        let lock = within(self.timeout, self.store.get(&lock_key(key))).await?;
        Ok(lock.is_some())
    }

    /// Count one failed login and lock the key once the maximum is reached.
    ///
    /// The comparison is `>=`, so a counter pushed past the maximum by
    /// concurrent failures still locks on the next evaluation.
    pub async fn record_failure(&self, key: &str) -> Result<ThrottleState, KvError> {
        let attempts_key = attempts_key(key);
        let count = within(self.timeout, self.store.incr(&attempts_key)).await?;
        // Every failure re-arms the window.
        within(self.timeout, self.store.expire(&attempts_key, self.window)).await?;

        if count >= i64::from(self.max_attempts) {
            within(
                self.timeout,
                self.store.set(&lock_key(key), "1", self.lockout),
            )
            .await?;
            within(self.timeout, self.store.delete(&[attempts_key.as_str()])).await?;
            warn!(identity = key, attempts = count, lockout = ?self.lockout, "login locked");
            return Ok(ThrottleState::Locked);
        }

        debug!(identity = key, attempts = count, "failed login recorded");
        Ok(ThrottleState::Accumulating(
            u32::try_from(count).unwrap_or(u32::MAX),
        ))
    }

    /// Clear both the counter and any lock. Idempotent.
    pub async fn record_success(&self, key: &str) -> Result<ThrottleState, KvError> {
        let attempts_key = attempts_key(key);
        let lock_key = lock_key(key);
        within(
            self.timeout,
            self.store.delete(&[attempts_key.as_str(), lock_key.as_str()]),
        )
        .await?;
        Ok(ThrottleState::Clear)
    }
}

fn attempts_key(key: &str) -> String {
    format!("{ATTEMPTS_PREFIX}{key}")
}

fn lock_key(key: &str) -> String {
    format!("{LOCK_PREFIX}{key}")
}
