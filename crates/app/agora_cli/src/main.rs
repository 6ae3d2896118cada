// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;
use std::time::Duration;

use agora_core::auth::{
    BcryptHasher, CredentialVerifier, LoginService, PgUserStore, TokenIssuer, bearer_token,
    resolve_jwt_secret,
};
use agora_core::config::AuthConfig;
use agora_core::kv::RedisStore;
use agora_core::models::auth::NewUser;
use clap::Parser;
use cli::{Cli, Commands, Connections};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

mod cli;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (ignore errors)
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        match e {
            // No subscriber to report through.
            Error::Logging(_) => eprintln!("{e}"),
            _ => error!("{}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();
    let config = AuthConfig::from_env();

    match args.command {
        Commands::Version => {
            println!(
                "{} {} (core {})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                agora_core::version()
            );
        }
        Commands::Migrate { conn } => {
            let pool = connect_db(&conn, &config).await?;
            agora_core::migrate(&pool).await?;
            info!("migrations applied");
        }
        Commands::Register {
            conn,
            name,
            nick,
            email,
            password,
        } => {
            let pool = connect_db(&conn, &config).await?;
            let users = PgUserStore::new(pool.clone());
            if users.email_exists(&email).await? {
                return Err(Error::Custom(format!("email already registered: {email}")));
            }
            let service = login_service(&conn, config, pool).await?;
            let id = users
                .create_user(&NewUser {
                    name,
                    nick,
                    email,
                    password_hash: service.hash_password(&password)?,
                })
                .await?;
            let token = service.issue_token_for_user(id).await?;
            print_json(&json!({ "id": id, "token": token }))?;
        }
        Commands::Login {
            conn,
            email,
            password,
            caller,
        } => {
            let pool = connect_db(&conn, &config).await?;
            let service = login_service(&conn, config, pool).await?;
            let auth = service.login(&email, &password, &caller).await?;
            print_json(&serde_json::to_value(&auth)?)?;
        }
        Commands::Anonymous { conn, caller } => {
            let pool = connect_db(&conn, &config).await?;
            let service = login_service(&conn, config, pool).await?;
            let session = service.login_anonymous(&caller).await?;
            print_json(&serde_json::to_value(&session)?)?;
        }
        Commands::Issue { conn, user_id } => {
            let pool = connect_db(&conn, &config).await?;
            let service = login_service(&conn, config, pool).await?;
            let token = service.issue_token_for_user(user_id).await?;
            print_json(&json!({ "id": user_id, "token": token }))?;
        }
        Commands::ChangePassword {
            conn,
            user_id,
            current,
            new,
        } => {
            let pool = connect_db(&conn, &config).await?;
            let service = login_service(&conn, config, pool).await?;
            service.change_password(user_id, &current, &new).await?;
            info!(user_id, "password changed");
        }
        Commands::RequestReset { conn, user_id } => {
            let pool = connect_db(&conn, &config).await?;
            let service = login_service(&conn, config, pool).await?;
            let code = service.request_password_reset(user_id).await?;
            print_json(&json!({ "id": user_id, "code": code }))?;
        }
        Commands::ResetPassword {
            conn,
            user_id,
            code,
            new,
            confirm,
        } => {
            let pool = connect_db(&conn, &config).await?;
            let service = login_service(&conn, config, pool).await?;
            service
                .reset_password(user_id, &code, &new, &confirm)
                .await?;
            info!(user_id, "password reset");
        }
        Commands::Verify { token } => {
            let token = bearer_token(&token).unwrap_or(token.trim());
            let issuer = TokenIssuer::new(resolve_jwt_secret().as_bytes(), &config);
            let claims = issuer.validate(token)?;
            print_json(&json!({
                "subject": claims.subject(),
                "anonymous": claims.is_anonymous(),
                "expires_at": claims.expires_at(),
            }))?;
        }
        Commands::HashPassword { password } => {
            let verifier = CredentialVerifier::new(Arc::new(BcryptHasher::new()));
            println!("{}", verifier.hash(&password)?);
        }
    }

    Ok(())
}

async fn connect_db(conn: &Connections, config: &AuthConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(conn.max_connections)
        .acquire_timeout(config.store_timeout.max(Duration::from_secs(1)))
        .connect(&conn.database_url)
        .await?;
    info!(max_connections = conn.max_connections, "database pool ready");
    Ok(pool)
}

async fn login_service(
    conn: &Connections,
    config: AuthConfig,
    pool: PgPool,
) -> Result<LoginService> {
    let store = RedisStore::connect(&conn.redis_url).await?;
    let issuer = TokenIssuer::new(resolve_jwt_secret().as_bytes(), &config);
    Ok(LoginService::new(
        config,
        issuer,
        Arc::new(PgUserStore::new(pool)),
        Arc::new(store),
        Arc::new(BcryptHasher::new()),
    ))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
