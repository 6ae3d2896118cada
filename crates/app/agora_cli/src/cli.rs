use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "agora", version, about = "Agora authentication CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Connection settings for commands that touch PostgreSQL or Redis.
#[derive(Args, Debug, Clone)]
pub struct Connections {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/agora"
    )]
    pub database_url: String,

    /// Redis connection URL.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    pub max_connections: u32,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Apply database migrations.
    Migrate {
        #[command(flatten)]
        conn: Connections,
    },

    /// Create a user and print a token for it.
    Register {
        #[command(flatten)]
        conn: Connections,
        #[arg(long)]
        name: String,
        #[arg(long)]
        nick: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "AGORA_PASSWORD")]
        password: String,
    },

    /// Log in with email and password.
    Login {
        #[command(flatten)]
        conn: Connections,
        #[arg(long)]
        email: String,
        #[arg(long, env = "AGORA_PASSWORD")]
        password: String,
        /// Caller identity (usually the client address).
        #[arg(long, default_value = "127.0.0.1")]
        caller: String,
    },

    /// Obtain an anonymous token for a caller.
    Anonymous {
        #[command(flatten)]
        conn: Connections,
        #[arg(long, default_value = "127.0.0.1")]
        caller: String,
    },

    /// Issue a token for an existing user ID.
    Issue {
        #[command(flatten)]
        conn: Connections,
        #[arg(long)]
        user_id: u64,
    },

    /// Change a user's password, re-checking the current one.
    ChangePassword {
        #[command(flatten)]
        conn: Connections,
        #[arg(long)]
        user_id: u64,
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },

    /// Issue a password recovery code and print it.
    RequestReset {
        #[command(flatten)]
        conn: Connections,
        #[arg(long)]
        user_id: u64,
    },

    /// Reset a password with a recovery code.
    ResetPassword {
        #[command(flatten)]
        conn: Connections,
        #[arg(long)]
        user_id: u64,
        #[arg(long)]
        code: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },

    /// Validate a token and print its claims.
    Verify {
        /// Raw token, or a full `Bearer <token>` header value.
        #[arg(long)]
        token: String,
    },

    /// Hash a password with bcrypt.
    HashPassword {
        #[arg(long, env = "AGORA_PASSWORD")]
        password: String,
    },
}
