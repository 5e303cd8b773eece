pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;
pub mod rate_limit;
pub mod service;
pub mod store;

use api::{AppState, create_api_router};
use axum::Router;
use clock::{Clock, SystemClock};
use jwt::JwtConfig;
use rate_limit::{DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE, RateLimitConfig};
use service::{AuthOptions, AuthService};
use std::net::SocketAddr;
use std::sync::Arc;
use store::Backend;
use tokio::net::TcpListener;

pub struct ServerConfig<B> {
    /// User and refresh token storage (cloneable, shares state internally)
    pub backend: B,
    /// JWT secret for signing access tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Refresh token reuse handling
    pub options: AuthOptions,
    /// Login attempts allowed per client IP per minute
    pub login_attempts_per_minute: u32,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_header: Option<cli::ClientIpHeader>,
    /// Time source for token issuance and expiry
    pub clock: Arc<dyn Clock>,
}

impl<B: Backend> ServerConfig<B> {
    /// Configuration with default settings and the system clock.
    pub fn new(backend: B, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            backend,
            jwt_secret: jwt_secret.into(),
            secure_cookies: false,
            options: AuthOptions::default(),
            login_attempts_per_minute: DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE,
            ip_header: None,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app<B: Backend>(config: &ServerConfig<B>) -> Router {
    build_app(config).0
}

/// Router plus the login limiter it was wired with.
fn build_app<B: Backend>(config: &ServerConfig<B>) -> (Router, Arc<RateLimitConfig>) {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));

    let auth = AuthService::new(
        config.backend.clone(),
        jwt,
        config.clock.clone(),
        config.options,
    );

    let state = AppState {
        auth,
        secure_cookies: config.secure_cookies,
    };

    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.login_attempts_per_minute,
        config.ip_header,
    ));

    (
        create_api_router(state, rate_limit_config.clone()),
        rate_limit_config,
    )
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Idle rate limiter entries are pruned in the background while it runs.
pub async fn run_server<B: Backend>(
    config: ServerConfig<B>,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let (app, rate_limit_config) = build_app(&config);
    let cleanup = rate_limit::spawn_limiter_cleanup(rate_limit_config);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let result = axum::serve(listener, make_service).await;

    cleanup.abort();
    result
}
