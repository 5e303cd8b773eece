//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::bearer_or_cookie;
use super::state::HasAuthService;
use crate::service::{AuthError, Authorized};

/// Extractor for endpoints that require a valid access token.
///
/// Reads the token from `Authorization: Bearer` or the access cookie and
/// runs it through [`crate::service::AuthService::authorize`]. Expired
/// tokens are not refreshed here; clients call the refresh endpoint.
pub struct Authenticated(pub Authorized);

impl<S> FromRequestParts<S> for Authenticated
where
    S: HasAuthService + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_or_cookie(&parts.headers).ok_or(AuthError::MissingToken)?;
        state.auth().authorize(token).await.map(Authenticated)
    }
}
