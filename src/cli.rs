//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::rate_limit::DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE;
use crate::service::AuthOptions;
use crate::store::{Backend, UserStore};
use clap::Parser;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Demo account seeded when no `--user` is given.
const DEFAULT_SEED: (&str, &str) = ("john", "123456");

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Proxy header carrying the real client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    XForwardedFor,
    XRealIp,
}

/// A `USERNAME:PASSWORD` pair to create on startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "keyturn",
    about = "Access tokens with rotating single-use refresh credentials"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "KEYTURN_PORT", default_value = "4000")]
    pub port: u16,

    /// Path to SQLite database file. Without it, state is kept in memory
    #[arg(short, long, env = "KEYTURN_DATABASE")]
    pub database: Option<String>,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// User to create on startup (repeatable). Defaults to the demo user john:123456
    #[arg(short, long = "user", value_name = "USERNAME:PASSWORD", value_parser = parse_seed_user)]
    pub users: Vec<SeedUser>,

    /// Set the Secure flag on cookies (use behind HTTPS)
    #[arg(long, env = "KEYTURN_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// On refresh token reuse, also revoke every token rotated from it
    #[arg(long)]
    pub revoke_chain_on_reuse: bool,

    /// Login attempts allowed per client IP per minute
    #[arg(long, default_value_t = DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE)]
    pub login_attempts_per_minute: u32,

    /// Take the client IP from this proxy header instead of the socket address
    #[arg(long)]
    pub ip_header: Option<ClientIpHeader>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_seed_user(s: &str) -> Result<SeedUser, String> {
    let (username, password) = s
        .split_once(':')
        .ok_or_else(|| format!("Expected USERNAME:PASSWORD, got: {}", s))?;

    if username.is_empty() {
        return Err("Username cannot be empty".to_string());
    }

    if password.is_empty() {
        return Err(format!("Password for '{}' cannot be empty", username));
    }

    Ok(SeedUser {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Create the seed users that do not exist yet.
/// With no seeds given, the demo user `john:123456` is created.
pub async fn seed_users<B: Backend>(backend: &B, seeds: &[SeedUser]) -> Option<()> {
    let default_seed = [SeedUser {
        username: DEFAULT_SEED.0.to_string(),
        password: DEFAULT_SEED.1.to_string(),
    }];
    let seeds = if seeds.is_empty() { &default_seed[..] } else { seeds };

    for seed in seeds {
        match backend.users().get_by_username(&seed.username).await {
            Ok(Some(existing)) => {
                info!(username = %existing.username, user_id = existing.id, "Seed user already exists");
            }
            Ok(None) => match backend.users().create(&seed.username, &seed.password).await {
                Ok(user) => {
                    warn!(
                        username = %user.username,
                        user_id = user.id,
                        "Seeded user, password is stored in plaintext"
                    );
                }
                Err(e) => {
                    error!(username = %seed.username, error = %e, "Failed to create seed user");
                    return None;
                }
            },
            Err(e) => {
                error!(username = %seed.username, error = %e, "Failed to look up seed user");
                return None;
            }
        }
    }

    Some(())
}

/// Build ServerConfig from validated arguments.
pub fn build_config<B: Backend>(args: &Args, backend: B, jwt_secret: String) -> ServerConfig<B> {
    let mut config = ServerConfig::new(backend, jwt_secret.into_bytes());
    config.secure_cookies = args.secure_cookies;
    config.options = AuthOptions {
        revoke_chain_on_reuse: args.revoke_chain_on_reuse,
    };
    config.login_attempts_per_minute = args.login_attempts_per_minute;
    config.ip_header = args.ip_header;
    config
}
