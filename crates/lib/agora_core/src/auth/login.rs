//! Login flows for registered and anonymous identities.
//!
//! Registered login: session cache → lockout check → user store → password
//! check → throttle update → token → session cache. Once the credential
//! decision is made, throttle and cache writes are best-effort: failures are
//! logged and the login result stands.
//!
//! A live cache entry is returned without re-checking the submitted password.
//! Password changes and resets made through this service drop the cached
//! session; a password changed elsewhere keeps the old session usable for up
//! to one cache TTL (`attempt_window`).
//!
//! Password reset redeems a recovery code. Wrong codes go through the same
//! throttle as logins, keyed by `recovery:<user_id>`.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt::TokenIssuer;
use super::password::{CredentialVerifier, PasswordHasher};
use super::recovery::RecoveryCodes;
use super::session_cache::{SessionCache, SessionCacheEntry};
use super::throttle::LoginThrottle;
use super::users::{UserStore, UserStoreError};
use crate::config::AuthConfig;
use crate::kv::KeyValueStore;
use crate::models::auth::{AnonymousSession, Authenticated, IdentityKey, TokenClaims};

/// Authentication entry point. Holds every collaborator explicitly; built
/// once at startup and shared across requests.
pub struct LoginService {
    config: AuthConfig,
    issuer: TokenIssuer,
    users: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
    throttle: LoginThrottle,
    sessions: SessionCache,
    recovery: RecoveryCodes,
}

impl LoginService {
    pub fn new(
        config: AuthConfig,
        issuer: TokenIssuer,
        users: Arc<dyn UserStore>,
        store: Arc<dyn KeyValueStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let verifier = CredentialVerifier::new(hasher);
        Self {
            throttle: LoginThrottle::new(store.clone(), &config),
            sessions: SessionCache::new(store.clone(), &config),
            recovery: RecoveryCodes::new(store, verifier.clone(), &config),
            verifier,
            config,
            issuer,
            users,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Authenticate with email + password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        caller_key: &str,
    ) -> Result<Authenticated, AuthError> {
        let identity = IdentityKey::Registered(email);

        if let Some(SessionCacheEntry {
            token,
            identity: Some(user),
        }) = self.cached(identity).await
        {
            debug!(email, caller = caller_key, "login served from session cache");
            return Ok(Authenticated { id: user.id, token });
        }

        if self.throttle.is_locked(email).await? {
            info!(email, caller = caller_key, "login rejected: locked out");
            return Err(AuthError::TooManyAttempts);
        }

        let Some(credentials) = self.bounded(self.users.find_by_email(email)).await? else {
            info!(email, caller = caller_key, "login failed: unknown email");
            self.note_failure(email).await;
            return Err(AuthError::InvalidCredentials);
        };

        if self
            .verifier
            .verify(&credentials.password_hash, password)
            .is_err()
        {
            info!(email, caller = caller_key, "login failed: wrong password");
            self.note_failure(email).await;
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(e) = self.throttle.record_success(email).await {
            warn!(email, error = %e, "could not clear login throttle");
        }

        let user = credentials.user;
        let token = self.issuer.issue_token(user.id)?;
        let id = user.id;
        let entry = SessionCacheEntry {
            token: token.clone(),
            identity: Some(user),
        };
        if let Err(e) = self
            .sessions
            .store(identity, &entry, self.config.attempt_window)
            .await
        {
            warn!(email, error = %e, "could not cache session");
        }

        info!(email, user_id = id, caller = caller_key, "login succeeded");
        Ok(Authenticated { id, token })
    }

    /// Hand out an anonymous token, reusing the cached one for `caller_key`.
    pub async fn login_anonymous(&self, caller_key: &str) -> Result<AnonymousSession, AuthError> {
        let identity = IdentityKey::Anonymous(caller_key);

        if let Some(entry) = self.cached(identity).await {
            debug!(caller = caller_key, "anonymous login served from session cache");
            return Ok(AnonymousSession { token: entry.token });
        }

        let token = self.issuer.issue_anonymous_token()?;
        let entry = SessionCacheEntry {
            token: token.clone(),
            identity: None,
        };
        if let Err(e) = self
            .sessions
            .store(identity, &entry, self.config.attempt_window)
            .await
        {
            warn!(caller = caller_key, error = %e, "could not cache anonymous session");
        }

        info!(caller = caller_key, "anonymous token issued");
        Ok(AnonymousSession { token })
    }

    /// Issue a token for an existing user, e.g. right after registration.
    pub async fn issue_token_for_user(&self, id: u64) -> Result<String, AuthError> {
        match self.bounded(self.users.find_by_id(id)).await? {
            Some(user) => self.issuer.issue_token(user.id),
            None => {
                info!(user_id = id, "token requested for unknown user");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Replace a user's password after re-checking the current one.
    pub async fn change_password(
        &self,
        user_id: u64,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        require_password(new)?;
        let Some(credentials) = self.bounded(self.users.find_credentials_by_id(user_id)).await?
        else {
            info!(user_id, "password change for unknown user");
            return Err(AuthError::InvalidCredentials);
        };
        if self
            .verifier
            .verify(&credentials.password_hash, current)
            .is_err()
        {
            info!(user_id, "password change rejected: wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        self.store_password(user_id, new).await?;
        self.drop_session(&credentials.user.email).await;
        info!(user_id, "password changed");
        Ok(())
    }

    /// Issue a recovery code for `user_id`. The caller delivers it out of band.
    pub async fn request_password_reset(&self, user_id: u64) -> Result<String, AuthError> {
        if self.bounded(self.users.find_by_id(user_id)).await?.is_none() {
            info!(user_id, "recovery code requested for unknown user");
            return Err(AuthError::InvalidCredentials);
        }
        let code = self.recovery.issue(user_id).await?;
        info!(user_id, "recovery code issued");
        Ok(code)
    }

    /// Set a new password by redeeming a recovery code.
    pub async fn reset_password(
        &self,
        user_id: u64,
        code: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        if new.is_empty() || confirm.is_empty() {
            return Err(AuthError::InvalidInput(
                "new password and confirmation are required".into(),
            ));
        }
        if new != confirm {
            return Err(AuthError::InvalidInput("passwords do not match".into()));
        }

        let throttle_key = format!("recovery:{user_id}");
        if self.throttle.is_locked(&throttle_key).await? {
            info!(user_id, "password reset rejected: locked out");
            return Err(AuthError::TooManyAttempts);
        }
        let Some(user) = self.bounded(self.users.find_by_id(user_id)).await? else {
            info!(user_id, "password reset for unknown user");
            self.note_failure(&throttle_key).await;
            return Err(AuthError::InvalidCredentials);
        };
        if !self.recovery.redeem(user_id, code).await? {
            info!(user_id, "password reset rejected: bad recovery code");
            self.note_failure(&throttle_key).await;
            return Err(AuthError::InvalidCredentials);
        }

        self.store_password(user_id, new).await?;
        if let Err(e) = self.throttle.record_success(&throttle_key).await {
            warn!(user_id, error = %e, "could not clear reset throttle");
        }
        self.drop_session(&user.email).await;
        info!(user_id, "password reset");
        Ok(())
    }

    /// Validate a bearer token. Authoritative for every request outside login.
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.issuer.validate(token)
    }

    /// Subject user ID of a valid token; `0` for anonymous tokens.
    pub fn extract_subject(&self, token: &str) -> Result<u64, AuthError> {
        self.issuer.extract_subject(token)
    }

    /// Hash a password for storage.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        self.verifier.hash(password)
    }

    /// Drop any cached session for `identity`.
    pub async fn invalidate_session(&self, identity: IdentityKey<'_>) -> Result<(), AuthError> {
        self.sessions.invalidate(identity).await?;
        Ok(())
    }

    /// Cache read that degrades to a miss when the store misbehaves.
    async fn cached(&self, identity: IdentityKey<'_>) -> Option<SessionCacheEntry> {
        match self.sessions.lookup(identity).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(identity = ?identity, error = %e, "session cache unavailable, treating as miss");
                None
            }
        }
    }

    async fn note_failure(&self, key: &str) {
        if let Err(e) = self.throttle.record_failure(key).await {
            warn!(identity = key, error = %e, "could not record failed attempt");
        }
    }

    async fn store_password(&self, user_id: u64, password: &str) -> Result<(), AuthError> {
        let hash = self.verifier.hash(password)?;
        if !self.bounded(self.users.update_password(user_id, &hash)).await? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(())
    }

    /// Best-effort removal of the cached session for `email`.
    async fn drop_session(&self, email: &str) {
        if let Err(e) = self.sessions.invalidate(IdentityKey::Registered(email)).await {
            warn!(email, error = %e, "could not drop cached session");
        }
    }

    /// Bound a user store call by the configured store timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, UserStoreError>>,
    ) -> Result<T, AuthError> {
        let limit = self.config.store_timeout;
        let result = tokio::time::timeout(limit, call)
            .await
            .map_err(|_| UserStoreError::Timeout(limit))?;
        Ok(result?)
    }
}

fn require_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::InvalidInput("new password is required".into()));
    }
    Ok(())
}
