//! API error envelope for the proxy boundary.
//!
//! Every failure crosses the boundary as `{ success: false, error: msg }`
//! with the German user-facing message the browser client displays
//! verbatim. Internal causes stay in the logs; no tokens or stack traces
//! leak to the UI layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::PerdisError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Bad request (400): missing or invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Unauthorized (401): the legacy portal rejected the credentials.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Internal error (500): upstream or transport failure.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PerdisError> for ApiError {
    fn from(err: PerdisError) -> Self {
        tracing::warn!(error = %err, "request failed");
        match err {
            PerdisError::InvalidCredentials => {
                Self::unauthorized("Benutzername oder Passwort falsch")
            }
            PerdisError::NotAuthenticated => Self::unauthorized("Nicht angemeldet"),
            PerdisError::HostNotAllowed(_) => Self::bad_request("Server nicht erlaubt"),
            PerdisError::TransportTimeout
            | PerdisError::Transport(_)
            | PerdisError::NoSessionCookie
            | PerdisError::AuthTransportFailure(_) => {
                Self::upstream("Keine Verbindung zum Server möglich")
            }
            PerdisError::CacheUnavailable(_) => Self::upstream("Serverfehler: Cache"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}
