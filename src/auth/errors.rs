//! HTTP mapping for authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::service::AuthError;

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidBody => StatusCode::BAD_REQUEST,
            AuthError::StaleTokenVersion | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Store(_) | AuthError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short machine-readable reason sent to the client.
    fn message(&self) -> String {
        match self {
            AuthError::Store(_) | AuthError::Token(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    msg: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }

        (
            status,
            Json(ErrorResponse {
                ok: false,
                msg: self.message(),
            }),
        )
            .into_response()
    }
}
