use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("Json::{}", .0)]
    Json(#[from] serde_json::Error),

    #[error("Database::{}", .0)]
    Database(#[from] sqlx::Error),

    #[error("Migrate::{}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Store::{}", .0)]
    Store(#[from] agora_core::kv::KvError),

    #[error("Users::{}", .0)]
    Users(#[from] agora_core::auth::users::UserStoreError),

    #[error("Auth::{} ({})", .0, .0.status())]
    Auth(#[from] agora_core::auth::AuthError),

    #[error("Logging::{}", .0)]
    Logging(String),
}
