//! Session endpoints.
//!
//! - POST `/login` - Check credentials, set access and refresh cookies
//! - POST `/auth/refresh` - Rotate the refresh credential, issue a new access token
//! - POST `/logout` - Revoke the refresh credential and clear both cookies
//! - GET `/auth/sessions` - List the caller's live refresh credentials
//! - DELETE `/auth/sessions/{refresh_id}` - Revoke one of the caller's own sessions

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use super::{AppState, Reply};
use crate::auth::{
    Authenticated, REFRESH_COOKIE_NAME, access_cookie, clear_access_cookie, clear_refresh_cookie,
    get_cookie, parse_refresh_cookie, refresh_cookie,
};
use crate::service::{AuthError, SessionTokens};
use crate::store::Backend;

#[derive(Deserialize, Default)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    user_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserIdField {
    Number(i64),
    Text(String),
}

/// Accept `1` as well as `"1"` for a user id.
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<UserIdField>::deserialize(deserializer)? {
        None => Ok(None),
        Some(UserIdField::Number(id)) => Ok(Some(id)),
        Some(UserIdField::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("userId is not a number: {}", text))),
    }
}

/// An empty body means no `userId`; anything else must be a valid request.
fn parse_logout_body(body: &[u8]) -> Result<LogoutRequest, AuthError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LogoutRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejected logout body");
        AuthError::InvalidBody
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionInfo {
    refresh_id: String,
    issued_at: u64,
    expires_at: u64,
}

#[derive(Serialize)]
struct SessionsResponse {
    ok: bool,
    msg: &'static str,
    sessions: Vec<SessionInfo>,
}

#[derive(Serialize)]
struct RevokeResponse {
    ok: bool,
    msg: &'static str,
    revoked: bool,
}

/// Build the pair of Set-Cookie headers for a freshly issued session.
fn session_cookies(tokens: &SessionTokens, secure: bool) -> AppendHeaders<[(HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            refresh_cookie(&tokens.refresh.cookie_value(), tokens.refresh.duration, secure),
        ),
        (
            SET_COOKIE,
            access_cookie(&tokens.access.token, tokens.access.duration, secure),
        ),
    ])
}

/// The refresh cookie value, if present and non-empty.
fn refresh_cookie_value(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, REFRESH_COOKIE_NAME).filter(|v| !v.is_empty())
}

/// Login with username and password.
/// A body that is not JSON is treated like missing credentials.
pub(super) async fn login<B: Backend>(
    State(state): State<AppState<B>>,
    body: Bytes,
) -> Result<impl IntoResponse, AuthError> {
    let payload: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();

    let tokens = state.auth.login(&payload.username, &payload.password).await?;

    Ok((
        StatusCode::OK,
        session_cookies(&tokens, state.secure_cookies),
        Json(Reply::ok("logged in")),
    ))
}

/// Exchange the refresh cookie for a new access token and a new refresh
/// cookie.
pub(super) async fn refresh<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let value = refresh_cookie_value(&headers).ok_or(AuthError::MissingRefresh)?;
    let (refresh_id, secret) = parse_refresh_cookie(value);

    let tokens = state.auth.rotate(refresh_id, secret).await?;

    Ok((
        StatusCode::OK,
        session_cookies(&tokens, state.secure_cookies),
        Json(Reply::ok("refreshed")),
    ))
}

/// Logout - revoke the refresh credential and clear both cookies.
/// With a `userId` in the body, that user's token version is bumped too,
/// which invalidates their access tokens everywhere. A body that is not
/// valid JSON is rejected before anything is revoked.
pub(super) async fn logout<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AuthError> {
    let payload = parse_logout_body(&body)?;

    let refresh_id = refresh_cookie_value(&headers).map(|v| parse_refresh_cookie(v).0);
    state.auth.logout(refresh_id, payload.user_id).await?;

    info!(user_id = ?payload.user_id, "Logged out");

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, clear_refresh_cookie(state.secure_cookies)),
            (SET_COOKIE, clear_access_cookie(state.secure_cookies)),
        ]),
        Json(Reply::ok("logged out")),
    ))
}

pub(super) async fn list_sessions<B: Backend>(
    State(state): State<AppState<B>>,
    Authenticated(auth): Authenticated,
) -> Result<impl IntoResponse, AuthError> {
    let sessions = state
        .auth
        .sessions(auth.user_id)
        .await?
        .into_iter()
        .map(|entry| SessionInfo {
            refresh_id: entry.refresh_id,
            issued_at: entry.issued_at,
            expires_at: entry.expires_at,
        })
        .collect();

    Ok(Json(SessionsResponse {
        ok: true,
        msg: "sessions",
        sessions,
    }))
}

/// Revoke a specific session. Unknown ids answer `revoked: false`.
pub(super) async fn revoke_session<B: Backend>(
    State(state): State<AppState<B>>,
    Authenticated(auth): Authenticated,
    Path(refresh_id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    let revoked = state.auth.revoke_session(auth.user_id, &refresh_id).await?;

    Ok(Json(RevokeResponse {
        ok: true,
        msg: if revoked {
            "session revoked"
        } else {
            "session not found"
        },
        revoked,
    }))
}
