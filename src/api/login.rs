//! The login/roster proxy endpoint.
//!
//! Browsers cannot carry a cookie session to an arbitrary legacy host, so
//! this endpoint performs the whole handshake server-side per request and
//! returns plain JSON. It accepts both request shapes the browser clients
//! ever sent: the plain `{ serverUrl, username, password }` login and the
//! action form `{ username, password, action, date? }` for single-day
//! shift details.

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::auth::SessionAuthenticator;
use crate::model::{Credentials, Roster, ShiftDetail};
use crate::scrape;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Login,
    Shift,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster: Option<Roster>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shifts: Option<ShiftDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = request.username.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request(
            "Benutzername und Passwort erforderlich",
        ));
    }

    // allow-list gate: never relay to a host outside the directory
    let profile = match &request.server_url {
        Some(url) => state.directory.resolve(url)?.clone(),
        None => state.directory.default_profile().clone(),
    };

    let authenticator =
        SessionAuthenticator::new(state.transport.clone(), state.config.legacy.reauth_days);
    let credentials = Credentials {
        username,
        password,
        profile,
    };
    let session = authenticator.login(&credentials).await?;

    match request.action.unwrap_or(Action::Login) {
        Action::Login => {
            let roster = scrape::fetch_listing(&state.transport, &session, None).await?;
            info!(
                server = %session.profile.id,
                days = roster.len(),
                "roster fetched via proxy"
            );
            Ok(Json(LoginResponse {
                success: true,
                roster: Some(roster),
                shifts: None,
                session: Some(session.cookie),
                message: Some("Erfolgreich angemeldet".to_string()),
            }))
        }
        Action::Shift => {
            let date = request
                .date
                .ok_or_else(|| ApiError::bad_request("Datum erforderlich"))?;
            let shifts = scrape::fetch_shift_detail(&state.transport, &session, date).await?;
            Ok(Json(LoginResponse {
                success: true,
                roster: None,
                shifts: Some(shifts),
                session: Some(session.cookie),
                message: None,
            }))
        }
    }
}
