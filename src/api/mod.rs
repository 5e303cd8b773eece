mod protected;
mod session;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::HasAuthService;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};
use crate::service::AuthService;
use crate::store::Backend;

/// State shared by every endpoint.
#[derive(Clone)]
pub struct AppState<B> {
    pub auth: AuthService<B>,
    /// Whether to set the Secure flag on cookies
    pub secure_cookies: bool,
}

impl<B: Backend> HasAuthService for AppState<B> {
    type Backend = B;

    fn auth(&self) -> &AuthService<B> {
        &self.auth
    }
}

/// The `{ok, msg}` envelope every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct Reply {
    pub ok: bool,
    pub msg: String,
}

impl Reply {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            ok: true,
            msg: msg.into(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            msg: msg.into(),
        }
    }
}

/// Create the API router. Only `/login` is rate limited.
pub fn create_api_router<B: Backend>(
    state: AppState<B>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let login_router = Router::new()
        .route("/login", post(session::login::<B>))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            rate_limit_config,
            rate_limit_login,
        ));

    let router = Router::new()
        .route("/auth/refresh", post(session::refresh::<B>))
        .route("/logout", post(session::logout::<B>))
        .route("/auth/sessions", get(session::list_sessions::<B>))
        .route(
            "/auth/sessions/{refresh_id}",
            delete(session::revoke_session::<B>),
        )
        .route("/protected", get(protected::protected))
        .with_state(state);

    Router::new().merge(login_router).merge(router)
}
