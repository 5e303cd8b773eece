//! Cookie parsing and `Set-Cookie` builders.

use axum::http::{HeaderMap, header};

/// Cookie name for the access token (short-lived, 60 seconds).
pub const ACCESS_COOKIE_NAME: &str = "at";

/// Cookie name for the refresh credential (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "jid";

/// The refresh cookie is only sent to the refresh endpoint.
pub const REFRESH_COOKIE_PATH: &str = "/auth/refresh";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Split a refresh cookie value into `(refresh_id, secret)`.
/// A value without a `.` yields an empty secret.
pub fn parse_refresh_cookie(value: &str) -> (&str, &str) {
    value.split_once('.').unwrap_or((value, ""))
}

/// Access token from `Authorization: Bearer <token>`, falling back to the
/// access cookie.
pub fn bearer_or_cookie(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| get_cookie(headers, ACCESS_COOKIE_NAME).filter(|t| !t.is_empty()))
}

fn secure_suffix(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

pub fn access_cookie(token: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        ACCESS_COOKIE_NAME,
        token,
        max_age,
        secure_suffix(secure)
    )
}

pub fn refresh_cookie(value: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path={}; Max-Age={}{}",
        REFRESH_COOKIE_NAME,
        value,
        REFRESH_COOKIE_PATH,
        max_age,
        secure_suffix(secure)
    )
}

pub fn clear_access_cookie(secure: bool) -> String {
    access_cookie("", 0, secure)
}

pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; at=abc123; jid=id.secret"),
        );

        assert_eq!(get_cookie(&headers, "at"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "jid"), Some("id.secret"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  at = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, "at"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_no_header() {
        let headers = HeaderMap::new();
        assert_eq!(get_cookie(&headers, "at"), None);
    }

    #[test]
    fn test_parse_refresh_cookie() {
        assert_eq!(parse_refresh_cookie("abc.def"), ("abc", "def"));
        assert_eq!(parse_refresh_cookie("abc"), ("abc", ""));
        assert_eq!(parse_refresh_cookie("abc."), ("abc", ""));
    }

    #[test]
    fn test_bearer_preferred_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("at=from-cookie"));
        assert_eq!(bearer_or_cookie(&headers), Some("from-cookie"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(bearer_or_cookie(&headers), Some("from-header"));
    }

    #[test]
    fn test_non_bearer_authorization_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_or_cookie(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("at=tok"));
        assert_eq!(bearer_or_cookie(&headers), Some("tok"));
    }

    #[test]
    fn test_cookie_attributes() {
        let refresh = refresh_cookie("id.secret", 604800, false);
        assert_eq!(
            refresh,
            "jid=id.secret; HttpOnly; SameSite=Lax; Path=/auth/refresh; Max-Age=604800"
        );

        let access = access_cookie("tok", 60, true);
        assert_eq!(
            access,
            "at=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=60; Secure"
        );

        assert!(clear_refresh_cookie(false).contains("Max-Age=0"));
        assert!(clear_access_cookie(false).starts_with("at=;"));
    }
}
