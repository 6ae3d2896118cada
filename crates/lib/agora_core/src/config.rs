//! Authentication configuration.

use std::time::Duration;

use tracing::warn;

/// Failed logins allowed inside one window before the identity is locked.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Window during which failed logins accumulate: 15 minutes.
pub const DEFAULT_ATTEMPT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Lockout length once the threshold is reached: 1 minute.
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(60);

/// Upper bound on any single store round-trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifetime of a registered user's token: 6 hours.
pub const DEFAULT_REGISTERED_TOKEN_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Lifetime of an anonymous token: 24 hours.
pub const DEFAULT_ANONYMOUS_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How long an issued password recovery code stays redeemable: 15 minutes.
pub const DEFAULT_RECOVERY_CODE_TTL: Duration = Duration::from_secs(15 * 60);

/// Tunables for the login flow. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub max_attempts: u32,
    /// Failure window; also used as the session cache TTL.
    pub attempt_window: Duration,
    pub lockout: Duration,
    pub store_timeout: Duration,
    pub registered_token_ttl: Duration,
    pub anonymous_token_ttl: Duration,
    pub recovery_code_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_window: DEFAULT_ATTEMPT_WINDOW,
            lockout: DEFAULT_LOCKOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            registered_token_ttl: DEFAULT_REGISTERED_TOKEN_TTL,
            anonymous_token_ttl: DEFAULT_ANONYMOUS_TOKEN_TTL,
            recovery_code_ttl: DEFAULT_RECOVERY_CODE_TTL,
        }
    }
}

impl AuthConfig {
    /// Reads overrides from environment variables.
    ///
    /// | Variable                 | Default |
    /// |--------------------------|---------|
    /// | `LOGIN_MAX_ATTEMPTS`     | `5`     |
    /// | `LOGIN_WINDOW_SECS`      | `900`   |
    /// | `LOGIN_LOCKOUT_SECS`     | `60`    |
    /// | `STORE_TIMEOUT_MS`       | `5000`  |
    /// | `RECOVERY_CODE_TTL_SECS` | `900`   |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AuthConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_attempts = read_u64(&lookup, "LOGIN_MAX_ATTEMPTS")
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_attempts);
        Self {
            max_attempts,
            attempt_window: read_u64(&lookup, "LOGIN_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.attempt_window),
            lockout: read_u64(&lookup, "LOGIN_LOCKOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.lockout),
            store_timeout: read_u64(&lookup, "STORE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            recovery_code_ttl: read_u64(&lookup, "RECOVERY_CODE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.recovery_code_ttl),
            ..defaults
        }
    }
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(variable = name, value = %raw, error = %e, "ignoring unparsable setting");
            None
        }
    }
}
