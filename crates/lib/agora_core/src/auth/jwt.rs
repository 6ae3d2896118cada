//! JWT token generation and verification.

use std::path::PathBuf;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::models::auth::TokenClaims;

/// The only accepted signing scheme. Tokens carrying any other `alg` are rejected.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims as they appear on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authorized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anonymous: Option<bool>,
    /// Decimal user ID. Accepted as a JSON string or number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Value>,
    exp: i64,
    #[serde(default)]
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
}

impl WireClaims {
    fn into_claims(self) -> Result<TokenClaims, AuthError> {
        if self.anonymous == Some(true) {
            return Ok(TokenClaims::Anonymous {
                expires_at: self.exp,
            });
        }
        let user_id = match self.sub {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse::<u64>().ok(),
            _ => None,
        }
        .ok_or_else(|| AuthError::InvalidToken("subject missing or not numeric".into()))?;
        Ok(TokenClaims::Registered {
            user_id,
            expires_at: self.exp,
        })
    }
}

/// Signs and validates bearer tokens with a process-wide HMAC secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    has_secret: bool,
    registered_ttl: chrono::Duration,
    anonymous_ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Build an issuer over `secret` using the token lifetimes from `config`.
    pub fn new(secret: &[u8], config: &AuthConfig) -> Self {
        Self::with_clock(secret, config, Arc::new(SystemClock))
    }

    /// Like [`TokenIssuer::new`], stamping and checking expiry against `clock`.
    pub fn with_clock(secret: &[u8], config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        // `exp` is still required; it is compared with `clock` in `validate`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            has_secret: !secret.is_empty(),
            registered_ttl: chrono::Duration::from_std(config.registered_token_ttl)
                .unwrap_or(chrono::Duration::hours(6)),
            anonymous_ttl: chrono::Duration::from_std(config.anonymous_token_ttl)
                .unwrap_or(chrono::Duration::hours(24)),
            clock,
        }
    }

    /// Issue a token for a registered user.
    pub fn issue_token(&self, user_id: u64) -> Result<String, AuthError> {
        let now = self.clock.now();
        self.sign(&WireClaims {
            authorized: Some(true),
            anonymous: None,
            sub: Some(Value::String(user_id.to_string())),
            exp: (now + self.registered_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
        })
    }

    /// Issue a token for an anonymous caller. Carries no subject.
    pub fn issue_anonymous_token(&self) -> Result<String, AuthError> {
        let now = self.clock.now();
        self.sign(&WireClaims {
            authorized: None,
            anonymous: Some(true),
            sub: None,
            exp: (now + self.anonymous_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
        })
    }

    /// Verify signature, algorithm and expiry, returning the parsed claims.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        if !self.has_secret {
            return Err(AuthError::InvalidToken("no signing secret configured".into()));
        }
        let data = decode::<WireClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::InvalidToken(rejection_reason(e.kind()).into())
        })?;
        if data.claims.exp < self.clock.now().timestamp() {
            debug!(exp = data.claims.exp, "token rejected: expired");
            return Err(AuthError::InvalidToken(
                rejection_reason(&ErrorKind::ExpiredSignature).into(),
            ));
        }
        data.claims.into_claims()
    }

    /// Subject user ID of a valid token; `0` for anonymous tokens.
    pub fn extract_subject(&self, token: &str) -> Result<u64, AuthError> {
        Ok(self.validate(token)?.subject())
    }

    fn sign(&self, claims: &WireClaims) -> Result<String, AuthError> {
        if !self.has_secret {
            return Err(AuthError::Signing("signing secret is empty".into()));
        }
        encode(&Header::new(ALGORITHM), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(format!("jwt encode: {e}")))
    }
}

fn rejection_reason(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ExpiredSignature => "token expired",
        ErrorKind::InvalidSignature => "bad signature",
        ErrorKind::InvalidAlgorithm => "unexpected signing algorithm",
        ErrorKind::MissingRequiredClaim(_) => "missing required claim",
        _ => "malformed token",
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.trim().split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Some(token)
        }
        _ => None,
    }
}

/// Resolve the signing secret: env var `JWT_SECRET` → `SECRET_KEY` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["JWT_SECRET", "SECRET_KEY"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), error = %e, "could not create secret directory");
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(path = %secret_path.display(), error = %e, "JWT secret not persisted"),
    }
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agora")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;

    const SECRET: &[u8] = b"test-secret";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, &AuthConfig::default())
    }

    fn forge(claims: Value, alg: Algorithm, secret: &[u8]) -> String {
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn registered_token_round_trips_subject() {
        let issuer = issuer();
        let token = issuer.issue_token(42).unwrap();

        let claims = issuer.validate(&token).unwrap();
        assert!(!claims.is_anonymous());
        assert_eq!(issuer.extract_subject(&token).unwrap(), 42);
    }

    #[test]
    fn registered_token_lives_six_hours() {
        let clock = ManualClock::starting_now();
        let issuer =
            TokenIssuer::with_clock(SECRET, &AuthConfig::default(), Arc::new(clock.clone()));
        let token = issuer.issue_token(1).unwrap();

        let claims = issuer.validate(&token).unwrap();
        let expected = (clock.now() + chrono::Duration::hours(6)).timestamp();
        assert_eq!(claims.expires_at(), expected);
    }

    #[test]
    fn anonymous_token_has_no_subject() {
        let issuer = issuer();
        let token = issuer.issue_anonymous_token().unwrap();

        let claims = issuer.validate(&token).unwrap();
        assert!(claims.is_anonymous());
        assert_eq!(issuer.extract_subject(&token).unwrap(), 0);
    }

    #[test]
    fn anonymous_tokens_are_unique() {
        let issuer = issuer();
        let a = issuer.issue_anonymous_token().unwrap();
        let b = issuer.issue_anonymous_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = TokenIssuer::new(b"another-secret", &AuthConfig::default());
        let token = other.issue_token(42).unwrap();
        assert!(matches!(
            issuer().validate(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_algorithm() {
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = forge(json!({"sub": "42", "exp": exp}), Algorithm::HS512, SECRET);
        let err = issuer().validate(&token).unwrap_err();
        assert!(
            matches!(&err, AuthError::InvalidToken(reason) if reason == "unexpected signing algorithm"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_expired_token() {
        let clock = ManualClock::new(Utc::now() - chrono::Duration::hours(7));
        let past = TokenIssuer::with_clock(SECRET, &AuthConfig::default(), Arc::new(clock));
        let token = past.issue_token(42).unwrap();

        let err = issuer().validate(&token).unwrap_err();
        assert!(matches!(&err, AuthError::InvalidToken(reason) if reason == "token expired"));
        assert!(issuer().extract_subject(&token).is_err());
    }

    #[test]
    fn expiry_follows_the_issuer_clock() {
        let clock = ManualClock::starting_now();
        let issuer =
            TokenIssuer::with_clock(SECRET, &AuthConfig::default(), Arc::new(clock.clone()));
        let token = issuer.issue_token(42).unwrap();

        clock.advance(chrono::Duration::hours(6));
        assert_eq!(issuer.extract_subject(&token).unwrap(), 42);

        clock.advance(chrono::Duration::seconds(1));
        let err = issuer.validate(&token).unwrap_err();
        assert!(matches!(&err, AuthError::InvalidToken(reason) if reason == "token expired"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            issuer().validate("not.a.token"),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(issuer().validate("").is_err());
    }

    #[test]
    fn rejects_registered_token_without_numeric_subject() {
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let missing = forge(json!({"authorized": true, "exp": exp}), ALGORITHM, SECRET);
        let textual = forge(json!({"sub": "alice", "exp": exp}), ALGORITHM, SECRET);

        assert!(matches!(
            issuer().extract_subject(&missing),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            issuer().extract_subject(&textual),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn accepts_numeric_subject_claim() {
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = forge(json!({"sub": 42, "exp": exp}), ALGORITHM, SECRET);
        assert_eq!(issuer().extract_subject(&token).unwrap(), 42);
    }

    #[test]
    fn rejects_token_without_expiry() {
        let token = forge(json!({"sub": "42"}), ALGORITHM, SECRET);
        assert!(issuer().validate(&token).is_err());
    }

    #[test]
    fn empty_secret_cannot_sign() {
        let issuer = TokenIssuer::new(b"", &AuthConfig::default());
        assert!(matches!(issuer.issue_token(1), Err(AuthError::Signing(_))));
        assert!(matches!(
            issuer.issue_anonymous_token(),
            Err(AuthError::Signing(_))
        ));
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer a b"), None);
        assert_eq!(bearer_token(""), None);
    }
}
