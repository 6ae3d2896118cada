//! Password change and recovery-code reset.

mod common;

use std::sync::Arc;

use agora_core::auth::AuthError;
use agora_core::kv::{KeyValueStore, MemoryStore};
use common::*;

const NEW_PASSWORD: &str = "tr0ub4dor&3";

fn wrong_code(code: &str) -> &'static str {
    if code == "0000" { "0001" } else { "0000" }
}

#[tokio::test]
async fn change_password_swaps_credentials_and_drops_session() {
    let h = harness(alice());
    let first = h
        .service
        .login(ALICE_EMAIL, ALICE_PASSWORD, "10.0.0.1")
        .await
        .unwrap();

    h.service
        .change_password(1, ALICE_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap();

    assert!(
        h.store
            .get("auth_token:alice@example.com")
            .await
            .unwrap()
            .is_none()
    );
    let err = h
        .service
        .login(ALICE_EMAIL, ALICE_PASSWORD, "10.0.0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let again = h
        .service
        .login(ALICE_EMAIL, NEW_PASSWORD, "10.0.0.1")
        .await
        .unwrap();
    assert_eq!(again.id, first.id);
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let h = harness(alice());
    let before = h.users.password_hash(1);

    let err = h
        .service
        .change_password(1, "not the password", NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(h.users.password_hash(1), before);

    let err = h
        .service
        .change_password(99, ALICE_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn change_password_rejects_empty_replacement() {
    let h = harness(alice());
    let err = h
        .service
        .change_password(1, ALICE_PASSWORD, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidInput(_)));
}

#[tokio::test]
async fn reset_with_recovery_code() {
    let h = harness(alice());
    h.service
        .login(ALICE_EMAIL, ALICE_PASSWORD, "10.0.0.1")
        .await
        .unwrap();

    let code = h.service.request_password_reset(1).await.unwrap();
    h.service
        .reset_password(1, &code, NEW_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap();

    assert!(
        h.store
            .get("auth_token:alice@example.com")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        h.service
            .login(ALICE_EMAIL, NEW_PASSWORD, "10.0.0.1")
            .await
            .is_ok()
    );

    let err = h
        .service
        .reset_password(1, &code, "again", "again")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn reset_checks_new_and_confirmation() {
    let h = harness(alice());
    let code = h.service.request_password_reset(1).await.unwrap();

    let err = h
        .service
        .reset_password(1, &code, NEW_PASSWORD, "something else")
        .await
        .unwrap_err();
    assert!(matches!(&err, AuthError::InvalidInput(reason) if reason == "passwords do not match"));

    let err = h
        .service
        .reset_password(1, &code, "", "")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidInput(_)));

    h.service
        .reset_password(1, &code, NEW_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn recovery_code_expires() {
    let h = harness(alice());
    let code = h.service.request_password_reset(1).await.unwrap();

    h.clock.advance(chrono::Duration::minutes(15));
    let err = h
        .service
        .reset_password(1, &code, NEW_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn guessing_recovery_codes_is_throttled() {
    let h = harness(alice());
    let code = h.service.request_password_reset(1).await.unwrap();
    let wrong = wrong_code(&code);

    for _ in 0..5 {
        let err = h
            .service
            .reset_password(1, wrong, NEW_PASSWORD, NEW_PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
    let err = h
        .service
        .reset_password(1, &code, NEW_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));

    h.clock.advance(chrono::Duration::seconds(61));
    h.service
        .reset_password(1, &code, NEW_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_lockout_does_not_block_login() {
    let h = harness(alice());
    let code = h.service.request_password_reset(1).await.unwrap();
    for _ in 0..5 {
        let _ = h
            .service
            .reset_password(1, wrong_code(&code), NEW_PASSWORD, NEW_PASSWORD)
            .await;
    }

    assert!(
        h.service
            .login(ALICE_EMAIL, ALICE_PASSWORD, "10.0.0.1")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn reset_for_unknown_user() {
    let h = harness(alice());
    assert!(matches!(
        h.service.request_password_reset(99).await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        h.service
            .reset_password(99, "1234", NEW_PASSWORD, NEW_PASSWORD)
            .await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn hung_user_store_fails_password_change() {
    let service = service_with(Arc::new(HangingUsers), Arc::new(MemoryStore::new()));

    let err = service
        .change_password(1, ALICE_PASSWORD, NEW_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Internal(_)), "{err}");
}
