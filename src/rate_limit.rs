//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::api::Reply;
use crate::auth::extract_client_ip;
use crate::cli::ClientIpHeader;

/// Default login attempts allowed per IP per minute.
pub const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

/// Interval between limiter pruning runs.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login attempts
    pub login: Arc<IpLimiter>,
    /// Header carrying the client IP when running behind a proxy
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    /// A zero quota is treated as one attempt per minute.
    pub fn new(login_per_minute: u32, ip_header: Option<ClientIpHeader>) -> Self {
        let per_minute = NonZeroU32::new(login_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            ip_header,
        }
    }

    /// Drop per-IP state that has fully replenished, so the key store only
    /// holds addresses seen within the last quota window.
    pub fn prune(&self) {
        self.login.retain_recent();
        self.login.shrink_to_fit();
    }
}

/// Spawn a background task that prunes the limiters periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_limiter_cleanup(config: Arc<RateLimitConfig>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            config.prune();
            debug!(tracked_ips = config.login.len(), "Pruned login rate limiter");
        }
    })
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE, None)
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Rejecting login without client IP");
            return (
                StatusCode::FORBIDDEN,
                Json(Reply::error("unable to determine client ip")),
            )
                .into_response();
        }
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(Reply::error("too many login attempts")),
            )
                .into_response()
        }
    }
}
