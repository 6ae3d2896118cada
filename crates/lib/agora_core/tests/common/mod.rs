//! Shared fixtures for login flow tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agora_core::auth::users::{UserStore, UserStoreError};
use agora_core::auth::{BcryptHasher, LoginService, PasswordHasher, TokenIssuer};
use agora_core::clock::ManualClock;
use agora_core::config::AuthConfig;
use agora_core::kv::{KeyValueStore, KvError, MemoryStore};
use agora_core::models::auth::{User, UserCredentials};
use async_trait::async_trait;

pub const SECRET: &[u8] = b"integration-secret";
pub const ALICE_EMAIL: &str = "alice@example.com";
pub const ALICE_PASSWORD: &str = "correct horse battery staple";

/// In-memory user store that counts lookups.
#[derive(Default)]
pub struct CountingUsers {
    users: Mutex<Vec<UserCredentials>>,
    email_lookups: AtomicUsize,
    id_lookups: AtomicUsize,
}

impl CountingUsers {
    pub fn with_user(mut self, id: u64, name: &str, email: &str, password: &str) -> Self {
        let password_hash = BcryptHasher::with_cost(4).hash(password).unwrap();
        self.users.get_mut().unwrap().push(UserCredentials {
            user: User {
                id,
                name: name.to_string(),
                email: email.to_string(),
            },
            password_hash,
        });
        self
    }

    pub fn email_lookups(&self) -> usize {
        self.email_lookups.load(Ordering::SeqCst)
    }

    pub fn id_lookups(&self) -> usize {
        self.id_lookups.load(Ordering::SeqCst)
    }

    pub fn password_hash(&self, id: u64) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.password_hash.clone())
    }
}

#[async_trait]
impl UserStore for CountingUsers {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, UserStoreError> {
        self.email_lookups.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.user.email == email).cloned())
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, UserStoreError> {
        Ok(self.find_credentials_by_id(id).await?.map(|c| c.user))
    }

    async fn find_credentials_by_id(
        &self,
        id: u64,
    ) -> Result<Option<UserCredentials>, UserStoreError> {
        self.id_lookups.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.user.id == id).cloned())
    }

    async fn update_password(&self, id: u64, password_hash: &str) -> Result<bool, UserStoreError> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.user.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// User store whose calls never complete.
pub struct HangingUsers;

#[async_trait]
impl UserStore for HangingUsers {
    async fn find_by_email(&self, _email: &str) -> Result<Option<UserCredentials>, UserStoreError> {
        std::future::pending().await
    }

    async fn find_by_id(&self, _id: u64) -> Result<Option<User>, UserStoreError> {
        std::future::pending().await
    }

    async fn find_credentials_by_id(
        &self,
        _id: u64,
    ) -> Result<Option<UserCredentials>, UserStoreError> {
        std::future::pending().await
    }

    async fn update_password(&self, _id: u64, _hash: &str) -> Result<bool, UserStoreError> {
        std::future::pending().await
    }
}

/// Key-value store that rejects every write made with `set`.
pub struct ReadOnlyStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: &str, ttl: Duration) -> Result<(), KvError> {
        Err(KvError::Timeout(ttl))
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, KvError> {
        self.inner.expire(key, ttl).await
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, KvError> {
        self.inner.delete(keys).await
    }
}

/// Key-value store whose calls never complete.
pub struct HangingStore;

#[async_trait]
impl KeyValueStore for HangingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), KvError> {
        std::future::pending().await
    }

    async fn incr(&self, _key: &str) -> Result<i64, KvError> {
        std::future::pending().await
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, KvError> {
        std::future::pending().await
    }

    async fn delete(&self, _keys: &[&str]) -> Result<u64, KvError> {
        std::future::pending().await
    }
}

/// A login service over in-memory collaborators sharing one manual clock.
pub struct Harness {
    pub service: LoginService,
    pub users: Arc<CountingUsers>,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
}

pub fn config() -> AuthConfig {
    AuthConfig {
        max_attempts: 5,
        attempt_window: Duration::from_secs(15 * 60),
        lockout: Duration::from_secs(60),
        store_timeout: Duration::from_millis(200),
        ..AuthConfig::default()
    }
}

pub fn alice() -> CountingUsers {
    CountingUsers::default().with_user(1, "Alice", ALICE_EMAIL, ALICE_PASSWORD)
}

pub fn harness(users: CountingUsers) -> Harness {
    let clock = ManualClock::starting_now();
    let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
    let users = Arc::new(users);
    let config = config();
    let issuer = TokenIssuer::with_clock(SECRET, &config, Arc::new(clock.clone()));
    let service = LoginService::new(
        config,
        issuer,
        users.clone(),
        store.clone(),
        Arc::new(BcryptHasher::with_cost(4)),
    );
    Harness {
        service,
        users,
        store,
        clock,
    }
}

pub fn service_with(users: Arc<dyn UserStore>, store: Arc<dyn KeyValueStore>) -> LoginService {
    let config = config();
    let issuer = TokenIssuer::new(SECRET, &config);
    LoginService::new(
        config,
        issuer,
        users,
        store,
        Arc::new(BcryptHasher::with_cost(4)),
    )
}
