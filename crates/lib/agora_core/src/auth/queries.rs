//! PostgreSQL user store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::users::{UserStore, UserStoreError};
use crate::models::auth::{NewUser, User, UserCredentials};

/// [`UserStore`] over the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new user, returning the user ID.
    pub async fn create_user(&self, user: &NewUser) -> Result<u64, UserStoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (name, nick, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&user.name)
        .bind(&user.nick)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        to_user_id(id)
    }

    /// Check whether an email is already registered.
    pub async fn email_exists(&self, email: &str) -> Result<bool, UserStoreError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, UserStoreError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT id, name, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(credentials_from_row).transpose()
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, UserStoreError> {
        let Some(db_id) = to_db_id(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, name, email FROM users WHERE id = $1",
        )
        .bind(db_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, name, email)| {
            Ok(User {
                id: to_user_id(id)?,
                name,
                email,
            })
        })
        .transpose()
    }

    async fn find_credentials_by_id(
        &self,
        id: u64,
    ) -> Result<Option<UserCredentials>, UserStoreError> {
        let Some(db_id) = to_db_id(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT id, name, email, password_hash FROM users WHERE id = $1",
        )
        .bind(db_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(credentials_from_row).transpose()
    }

    async fn update_password(&self, id: u64, password_hash: &str) -> Result<bool, UserStoreError> {
        let Some(db_id) = to_db_id(id) else {
            return Ok(false);
        };
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(db_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

type CredentialsRow = (i64, String, String, String);

fn credentials_from_row(
    (id, name, email, password_hash): CredentialsRow,
) -> Result<UserCredentials, UserStoreError> {
    Ok(UserCredentials {
        user: User {
            id: to_user_id(id)?,
            name,
            email,
        },
        password_hash,
    })
}

fn to_db_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn to_user_id(id: i64) -> Result<u64, UserStoreError> {
    u64::try_from(id).map_err(|_| UserStoreError::Corrupt(format!("negative user id {id}")))
}
