//! Raw HTTP access to a legacy PERDIS host.
//!
//! The legacy portal is an ASP.NET application that identifies a client
//! purely by its session cookie, so this layer propagates a caller-supplied
//! cookie header verbatim and captures any `Set-Cookie` response header
//! verbatim. The cookie format is opaque; the only processing anywhere in
//! the crate is [`session_cookie_token`], which splits on `;` and keeps the
//! first `name=value` token.
//!
//! One attempt per call, bounded by the configured timeout. Redirects are
//! not followed; the `Set-Cookie` of the first hop is the session.

use bytes::Bytes;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;

use crate::error::{PerdisError, Result};
use crate::model::ServerProfile;

/// User-Agent the legacy server expects from this client family.
const USER_AGENT: &str = "PERDISWEB/1.0";

/// Status, captured cookie header and body of one legacy response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub set_cookie: Option<String>,
    pub body: String,
}

/// Shared outbound HTTP client for legacy hosts.
#[derive(Debug, Clone)]
pub struct LegacyTransport {
    client: reqwest::Client,
}

impl LegacyTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PerdisError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// GET a path below the profile's base URL.
    pub async fn get(
        &self,
        profile: &ServerProfile,
        path: &str,
        cookie: Option<&str>,
    ) -> Result<RawResponse> {
        let url = format!("{}{}", profile.base_url, path);
        debug!(server = %profile.id, %path, "GET legacy portal");
        let mut request = self.client.get(&url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        Self::capture(response).await
    }

    /// POST a form-encoded body below the profile's base URL. The Referer
    /// header is set to the request URL itself, as the legacy login page
    /// would have done.
    pub async fn post_form(
        &self,
        profile: &ServerProfile,
        path: &str,
        form: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Result<RawResponse> {
        let url = format!("{}{}", profile.base_url, path);
        debug!(server = %profile.id, %path, "POST legacy portal");
        let mut request = self.client.post(&url).header(REFERER, &url).form(form);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        Self::capture(response).await
    }

    /// GET an opaque binary (the print sheet PDF).
    pub async fn get_bytes(
        &self,
        profile: &ServerProfile,
        path: &str,
        cookie: Option<&str>,
    ) -> Result<Bytes> {
        let url = format!("{}{}", profile.base_url, path);
        debug!(server = %profile.id, %path, "GET legacy binary");
        let mut request = self.client.get(&url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        response.bytes().await.map_err(map_reqwest_error)
    }

    async fn capture(response: reqwest::Response) -> Result<RawResponse> {
        let status = response.status().as_u16();
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(RawResponse {
            status,
            set_cookie,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> PerdisError {
    if err.is_timeout() {
        PerdisError::TransportTimeout
    } else {
        PerdisError::Transport(err.to_string())
    }
}

/// Reduce a verbatim `Set-Cookie` header to the `name=value` token the
/// server wants echoed back. No further parsing; the token is opaque.
pub fn session_cookie_token(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or(set_cookie)
        .trim()
        .to_string()
}
