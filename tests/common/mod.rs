//! In-process stand-in for a legacy PERDIS portal.
//!
//! Serves the same endpoints the real ASP.NET application exposes, built
//! from the same axum stack as the proxy itself. Request counters let
//! tests assert how often the "legacy server" was actually hit.

#![allow(dead_code)]

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use perdisweb::model::ServerProfile;

pub const SESSION_COOKIE: &str = "ASP.NET_SessionId=fixture123";

/// Roster listing as the portal renders it for a logged-in session.
pub const ROSTER_PAGE: &str = r#"
<html><body>
<a href="logout.aspx">Abmelden</a>
<table border="1">
<tr><th>Datum</th><th>Linie</th><th>Von</th><th>Bis</th><th>Ort</th></tr>
<tr><td>03.01.2026</td><td>5</td><td>06:30</td><td>08:45</td><td>Zentrum</td></tr>
</table>
</body></html>
"#;

/// Shift-detail page for one day.
pub const SHIFT_PAGE: &str = r#"
<html><body>
<a href="logout.aspx">Abmelden</a>
<h1>Dienst 104</h1>
<p>Linie: 12</p>
<p>Dienstzeit 06:30 - 14:45</p>
</body></html>
"#;

/// What an unauthenticated client gets, whatever it asked for.
pub const LOGIN_PAGE: &str = r#"
<html><body>
<form method="post" action="default.aspx">
Bitte Anmelden: <input name="user"><input name="passwd" type="password">
</form>
</body></html>
"#;

#[derive(Default)]
pub struct Hits {
    pub entry: AtomicUsize,
    pub login: AtomicUsize,
    pub roster: AtomicUsize,
    pub dated_roster: AtomicUsize,
    pub shift: AtomicUsize,
    pub logout: AtomicUsize,
}

impl Hits {
    pub fn total(&self) -> usize {
        self.entry.load(Ordering::SeqCst)
            + self.login.load(Ordering::SeqCst)
            + self.roster.load(Ordering::SeqCst)
            + self.shift.load(Ordering::SeqCst)
            + self.logout.load(Ordering::SeqCst)
    }
}

pub struct PortalOptions {
    /// Whether the entry page issues a session cookie.
    pub issue_cookie: bool,
    /// Whether a cookie-bearing client gets logged-in pages.
    pub accept_login: bool,
    /// Artificial latency on the roster listing, to overlap requests.
    pub roster_delay: Duration,
}

impl Default for PortalOptions {
    fn default() -> Self {
        Self {
            issue_cookie: true,
            accept_login: true,
            roster_delay: Duration::ZERO,
        }
    }
}

struct Inner {
    issue_cookie: bool,
    accept_login: AtomicBool,
    roster_delay: Duration,
    hits: Hits,
}

pub struct FixturePortal {
    pub base_url: String,
    inner: Arc<Inner>,
}

impl FixturePortal {
    pub fn hits(&self) -> &Hits {
        &self.inner.hits
    }

    /// Flip whether the portal still honors the session, emulating a
    /// server-side expiry mid-use.
    pub fn set_accept_login(&self, accept: bool) {
        self.inner.accept_login.store(accept, Ordering::SeqCst);
    }

    pub fn profile(&self) -> ServerProfile {
        ServerProfile::new("fixture", "Fixture Portal", &self.base_url)
    }
}

fn authed(inner: &Inner, headers: &HeaderMap) -> bool {
    let has_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |c| c.contains(SESSION_COOKIE));
    has_cookie && inner.accept_login.load(Ordering::SeqCst)
}

async fn entry(State(inner): State<Arc<Inner>>) -> Response {
    inner.hits.entry.fetch_add(1, Ordering::SeqCst);
    if inner.issue_cookie {
        (
            [(
                header::SET_COOKIE,
                format!("{}; path=/; HttpOnly", SESSION_COOKIE),
            )],
            Html(LOGIN_PAGE),
        )
            .into_response()
    } else {
        Html(LOGIN_PAGE).into_response()
    }
}

async fn submit_login(State(inner): State<Arc<Inner>>) -> &'static str {
    inner.hits.login.fetch_add(1, Ordering::SeqCst);
    // the real server answers 200 regardless; only the follow-up roster
    // probe reveals whether the credentials were accepted
    "ok"
}

async fn roster(
    State(inner): State<Arc<Inner>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    inner.hits.roster.fetch_add(1, Ordering::SeqCst);
    if query.as_deref().is_some_and(|q| q.contains("date=")) {
        inner.hits.dated_roster.fetch_add(1, Ordering::SeqCst);
    }
    if !inner.roster_delay.is_zero() {
        tokio::time::sleep(inner.roster_delay).await;
    }
    if authed(&inner, &headers) {
        Html(ROSTER_PAGE).into_response()
    } else {
        Html(LOGIN_PAGE).into_response()
    }
}

async fn shift(State(inner): State<Arc<Inner>>, headers: HeaderMap) -> Response {
    inner.hits.shift.fetch_add(1, Ordering::SeqCst);
    if authed(&inner, &headers) {
        Html(SHIFT_PAGE).into_response()
    } else {
        Html(LOGIN_PAGE).into_response()
    }
}

async fn logout(State(inner): State<Arc<Inner>>) -> &'static str {
    inner.hits.logout.fetch_add(1, Ordering::SeqCst);
    "bye"
}

pub async fn spawn(options: PortalOptions) -> FixturePortal {
    let inner = Arc::new(Inner {
        issue_cookie: options.issue_cookie,
        accept_login: AtomicBool::new(options.accept_login),
        roster_delay: options.roster_delay,
        hits: Hits::default(),
    });

    let app = Router::new()
        .route("/WebComm/default.aspx", get(entry).post(submit_login))
        .route("/WebComm/roster.aspx", get(roster))
        .route("/WebComm/shift.aspx", get(shift))
        .route("/WebComm/logout.aspx", get(logout))
        .with_state(inner.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture portal");
    let addr = listener.local_addr().expect("fixture portal addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture portal");
    });

    FixturePortal {
        base_url: format!("http://{}", addr),
        inner,
    }
}

pub async fn spawn_default() -> FixturePortal {
    spawn(PortalOptions::default()).await
}
