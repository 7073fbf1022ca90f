//! Login handshake against the legacy portal.
//!
//! The portal never answers a bad login with a distinct status code; the
//! only reliable signal is what page comes back when the session cookie is
//! pointed at a protected endpoint. The handshake therefore runs in three
//! steps (prime a cookie, submit the form, probe roster access) and a
//! failure at any step leaves nothing behind.
//!
//! Exact paths and form field names are a wire contract with the ASP.NET
//! application and must not change.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{PerdisError, Result};
use crate::model::{Credentials, ServerProfile, Session};
use crate::scrape::LISTING_PATH;
use crate::transport::{session_cookie_token, LegacyTransport};

/// Entry page; the query parameter makes the server issue a cookie before
/// any credentials are shown to it.
pub const ENTRY_PATH: &str = "/WebComm/default.aspx?TestingCookie=1";
/// Login form target.
pub const LOGIN_PATH: &str = "/WebComm/default.aspx";
/// Server-side session teardown.
pub const LOGOUT_PATH: &str = "/WebComm/logout.aspx";

/// Markers of the login page, any of which means the session was bounced.
const LOGIN_PAGE_MARKERS: [&str; 3] = ["login", "log in", "anmelden"];
/// Markers of a logged-in page (navigation shows the logout link, the
/// roster view, or its German label).
const LOGGED_IN_MARKERS: [&str; 3] = ["logout", "roster", "abmelden"];

/// True when the body reads like the portal's login page.
pub fn looks_like_login_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    LOGIN_PAGE_MARKERS.iter().any(|m| lower.contains(m))
}

/// True when the body carries logged-in navigation and none of the
/// login-page markers.
pub fn looks_logged_in(body: &str) -> bool {
    let lower = body.to_lowercase();
    LOGGED_IN_MARKERS.iter().any(|m| lower.contains(m))
        && !LOGIN_PAGE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Outcome of re-validating a previously established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    NeedsReauth,
}

/// Runs the legacy login handshake and session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    transport: LegacyTransport,
    reauth_days: i64,
}

impl SessionAuthenticator {
    pub fn new(transport: LegacyTransport, reauth_days: i64) -> Self {
        Self {
            transport,
            reauth_days,
        }
    }

    /// Acquire cookie, submit credentials, verify roster access.
    ///
    /// Returns the established [`Session`] or the first failure; partial
    /// attempts leave no session state behind.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let profile = &credentials.profile;

        // Step 1: the server issues the session identifier on first contact.
        let response = self.transport.get(profile, ENTRY_PATH, None).await?;
        let set_cookie = response.set_cookie.ok_or(PerdisError::NoSessionCookie)?;
        let cookie = session_cookie_token(&set_cookie);
        debug!(server = %profile.id, "session cookie primed");

        // Step 2: form field names are fixed by the ASP.NET page.
        let form = [
            ("user", credentials.username.as_str()),
            ("passwd", credentials.password.as_str()),
            ("login", "Login"),
        ];
        self.transport
            .post_form(profile, LOGIN_PATH, &form, Some(&cookie))
            .await
            .map_err(|err| match err {
                PerdisError::TransportTimeout => PerdisError::TransportTimeout,
                other => PerdisError::AuthTransportFailure(other.to_string()),
            })?;

        // Step 3: the only way to detect a bad password.
        if !self.verify_access(profile, &cookie).await? {
            return Err(PerdisError::InvalidCredentials);
        }

        info!(server = %profile.id, user = %credentials.username, "login succeeded");
        Ok(Session {
            cookie,
            profile: profile.clone(),
            established_at: Utc::now(),
        })
    }

    /// Probe the roster listing with the given cookie.
    async fn verify_access(&self, profile: &ServerProfile, cookie: &str) -> Result<bool> {
        let response = self.transport.get(profile, LISTING_PATH, Some(cookie)).await?;
        Ok(response.status == 200 && looks_logged_in(&response.body))
    }

    /// Best-effort server-side logout. Failures are logged and swallowed;
    /// local teardown must succeed unconditionally.
    pub async fn logout(&self, session: &Session) {
        match self
            .transport
            .get(&session.profile, LOGOUT_PATH, Some(&session.cookie))
            .await
        {
            Ok(_) => info!(server = %session.profile.id, "server-side logout done"),
            Err(err) => {
                warn!(server = %session.profile.id, error = %err, "server-side logout failed")
            }
        }
    }

    /// Re-validate a persisted session.
    ///
    /// A session past the re-authentication interval is stale by policy
    /// and reported without any network call; otherwise the same roster
    /// probe as at login decides. Never errors; any failure to verify
    /// simply means a fresh login is needed.
    pub async fn restore(&self, session: &Session) -> RestoreOutcome {
        if session.age_days(Utc::now()) > self.reauth_days {
            debug!(server = %session.profile.id, "session past re-auth interval");
            return RestoreOutcome::NeedsReauth;
        }
        match self.verify_access(&session.profile, &session.cookie).await {
            Ok(true) => RestoreOutcome::Restored,
            Ok(false) => RestoreOutcome::NeedsReauth,
            Err(err) => {
                warn!(server = %session.profile.id, error = %err, "session probe failed");
                RestoreOutcome::NeedsReauth
            }
        }
    }

    pub fn reauth_days(&self) -> i64 {
        self.reauth_days
    }
}
