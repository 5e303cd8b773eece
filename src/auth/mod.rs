//! HTTP side of authentication.
//!
//! Two credentials travel as cookies: a short-lived access token (`at`,
//! 60 s, sent everywhere) and an opaque refresh credential (`jid`, 7 days,
//! only sent to the refresh endpoint). The access token may also arrive as a
//! bearer token.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH, access_cookie,
    bearer_or_cookie, clear_access_cookie, clear_refresh_cookie, get_cookie,
    parse_refresh_cookie, refresh_cookie,
};
pub use extractors::Authenticated;
pub use ip::extract_client_ip;
pub use state::HasAuthService;
