//! GET `/protected` - sample resource behind the access token.

use axum::{Json, response::IntoResponse};
use serde::Serialize;

use crate::auth::Authenticated;

#[derive(Serialize)]
struct ProtectedResponse {
    ok: bool,
    msg: &'static str,
    #[serde(rename = "userId")]
    user_id: i64,
}

pub(super) async fn protected(Authenticated(auth): Authenticated) -> impl IntoResponse {
    Json(ProtectedResponse {
        ok: true,
        msg: "protected content",
        user_id: auth.user_id,
    })
}
