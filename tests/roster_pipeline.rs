//! End-to-end tests of the acquisition pipeline against a fixture portal:
//! login handshake, scrape, cache behavior and request coalescing.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use perdisweb::auth::{RestoreOutcome, SessionAuthenticator};
use perdisweb::cache::{MemoryStore, RosterCache};
use perdisweb::model::{Credentials, Session, Trip};
use perdisweb::service::RosterService;
use perdisweb::transport::LegacyTransport;
use perdisweb::PerdisError;

use common::{spawn, spawn_default, FixturePortal, PortalOptions};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn expected_trip() -> Trip {
    Trip {
        line: "5".into(),
        start: "06:30".into(),
        end: "08:45".into(),
        location: "Zentrum".into(),
    }
}

fn transport() -> LegacyTransport {
    LegacyTransport::new(Duration::from_secs(5)).unwrap()
}

fn new_service() -> RosterService {
    let cache = RosterCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
    RosterService::new(transport(), cache, 30)
}

fn credentials_for(portal: &FixturePortal) -> Credentials {
    Credentials {
        username: "max".into(),
        password: "geheim".into(),
        profile: portal.profile(),
    }
}

#[tokio::test]
async fn login_then_get_day_returns_the_scraped_trip() {
    let portal = spawn_default().await;
    let service = new_service();

    service.login(credentials_for(&portal)).await.unwrap();
    assert!(service.is_logged_in().await);

    let day = service.get_day(date("2026-01-03")).await.unwrap();
    assert_eq!(day, vec![expected_trip()]);
}

#[tokio::test]
async fn day_absent_from_listing_is_confirmed_empty() {
    let portal = spawn_default().await;
    let service = new_service();
    service.login(credentials_for(&portal)).await.unwrap();

    let day = service.get_day(date("2026-01-04")).await.unwrap();
    assert!(day.is_empty());

    // the confirmed-empty day is cached: no second upstream fetch
    let before = portal.hits().dated_roster.load(Ordering::SeqCst);
    let day = service.get_day(date("2026-01-04")).await.unwrap();
    assert!(day.is_empty());
    assert_eq!(portal.hits().dated_roster.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn cache_shields_the_portal_from_repeated_reads() {
    let portal = spawn_default().await;
    let service = new_service();
    service.login(credentials_for(&portal)).await.unwrap();

    for _ in 0..3 {
        let day = service.get_day(date("2026-01-03")).await.unwrap();
        assert_eq!(day.len(), 1);
    }
    assert_eq!(portal.hits().dated_roster.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_requests_for_one_date_coalesce() {
    let portal = spawn(PortalOptions {
        roster_delay: Duration::from_millis(150),
        ..Default::default()
    })
    .await;
    let service = new_service();
    service.login(credentials_for(&portal)).await.unwrap();

    let target = date("2026-01-03");
    let (a, b) = tokio::join!(service.get_day(target), service.get_day(target));
    assert_eq!(a.unwrap(), vec![expected_trip()]);
    assert_eq!(b.unwrap(), vec![expected_trip()]);

    // exactly one underlying scrape for the date
    assert_eq!(portal.hits().dated_roster.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_credentials_surface_as_invalid_credentials() {
    let portal = spawn(PortalOptions {
        accept_login: false,
        ..Default::default()
    })
    .await;
    let service = new_service();

    let err = service.login(credentials_for(&portal)).await.unwrap_err();
    assert!(matches!(err, PerdisError::InvalidCredentials));
    assert!(!service.is_logged_in().await);
}

#[tokio::test]
async fn missing_set_cookie_fails_the_handshake() {
    let portal = spawn(PortalOptions {
        issue_cookie: false,
        ..Default::default()
    })
    .await;
    let service = new_service();

    let err = service.login(credentials_for(&portal)).await.unwrap_err();
    assert!(matches!(err, PerdisError::NoSessionCookie));
    // the handshake stopped before credentials were ever submitted
    assert_eq!(portal.hits().login.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn get_day_without_a_session_is_not_authenticated() {
    let portal = spawn_default().await;
    let service = new_service();

    let err = service.get_day(date("2026-01-03")).await.unwrap_err();
    assert!(matches!(err, PerdisError::NotAuthenticated));
    assert_eq!(portal.hits().total(), 0);
}

#[tokio::test]
async fn mid_session_bounce_drops_the_session() {
    let portal = spawn_default().await;
    let service = new_service();
    service.login(credentials_for(&portal)).await.unwrap();

    // the portal stops honoring the cookie; no credentials are replayed
    // because the held ones now yield the same bounce
    portal.set_accept_login(false);

    let err = service.get_day(date("2026-01-03")).await.unwrap_err();
    assert!(matches!(err, PerdisError::InvalidCredentials));
    assert!(!service.is_logged_in().await);
}

#[tokio::test]
async fn logout_clears_local_state_and_cache() {
    let portal = spawn_default().await;
    let service = new_service();
    service.login(credentials_for(&portal)).await.unwrap();
    service.get_day(date("2026-01-03")).await.unwrap();

    service.logout().await;
    assert!(!service.is_logged_in().await);
    assert_eq!(portal.hits().logout.load(Ordering::SeqCst), 1);

    // cache was cleared with the session, so the next read needs auth
    let err = service.get_day(date("2026-01-03")).await.unwrap_err();
    assert!(matches!(err, PerdisError::NotAuthenticated));
}

#[tokio::test]
async fn stale_session_restore_needs_reauth_without_network() {
    let portal = spawn_default().await;
    let authenticator = SessionAuthenticator::new(transport(), 30);

    let session = Session {
        cookie: common::SESSION_COOKIE.to_string(),
        profile: portal.profile(),
        established_at: Utc::now() - chrono::Duration::days(31),
    };

    let outcome = authenticator.restore(&session).await;
    assert_eq!(outcome, RestoreOutcome::NeedsReauth);
    assert_eq!(portal.hits().total(), 0);
}

#[tokio::test]
async fn fresh_session_restore_probes_and_succeeds() {
    let portal = spawn_default().await;
    let authenticator = SessionAuthenticator::new(transport(), 30);

    let session = Session {
        cookie: common::SESSION_COOKIE.to_string(),
        profile: portal.profile(),
        established_at: Utc::now(),
    };

    assert_eq!(
        authenticator.restore(&session).await,
        RestoreOutcome::Restored
    );
    assert_eq!(portal.hits().roster.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fresh_session_restore_detects_server_side_expiry() {
    let portal = spawn(PortalOptions {
        accept_login: false,
        ..Default::default()
    })
    .await;
    let authenticator = SessionAuthenticator::new(transport(), 30);

    let session = Session {
        cookie: common::SESSION_COOKIE.to_string(),
        profile: portal.profile(),
        established_at: Utc::now(),
    };

    assert_eq!(
        authenticator.restore(&session).await,
        RestoreOutcome::NeedsReauth
    );
}

#[tokio::test]
async fn shift_detail_is_scraped_for_a_day() {
    let portal = spawn_default().await;
    let service = new_service();
    service.login(credentials_for(&portal)).await.unwrap();

    let detail = service.get_shift_detail(date("2026-01-03")).await.unwrap();
    assert_eq!(detail.line, "12");
    assert_eq!(detail.start, "06:30");
    assert_eq!(detail.end, "14:45");
}

#[tokio::test]
async fn range_is_date_sorted_with_confirmed_empty_days() {
    let portal = spawn_default().await;
    let service = new_service();
    service.login(credentials_for(&portal)).await.unwrap();

    let roster = service
        .get_range(date("2026-01-02"), date("2026-01-04"))
        .await
        .unwrap();

    let dates: Vec<String> = roster.keys().map(|d| d.to_string()).collect();
    assert_eq!(dates, ["2026-01-02", "2026-01-03", "2026-01-04"]);
    assert!(roster[&date("2026-01-02")].is_empty());
    assert_eq!(roster[&date("2026-01-03")], vec![expected_trip()]);
    assert!(roster[&date("2026-01-04")].is_empty());
}
