//! Orchestration of authenticator, scraper and cache.
//!
//! One `RosterService` owns at most one active legacy identity; spin up
//! independent instances for independent identities. The session is a
//! value held by the instance, not process-global state.

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::auth::{RestoreOutcome, SessionAuthenticator};
use crate::cache::RosterCache;
use crate::error::{PerdisError, Result};
use crate::model::{Credentials, DayRoster, Roster, Session, ShiftDetail};
use crate::scrape;
use crate::transport::LegacyTransport;

pub struct RosterService {
    transport: LegacyTransport,
    authenticator: SessionAuthenticator,
    cache: RosterCache,
    session: RwLock<Option<Session>>,
    credentials: RwLock<Option<Credentials>>,
    /// Per-date gates so a burst of identical requests produces a single
    /// upstream scrape. Entries are removed once the fetch settles.
    inflight: DashMap<NaiveDate, Arc<Mutex<()>>>,
}

impl RosterService {
    pub fn new(transport: LegacyTransport, cache: RosterCache, reauth_days: i64) -> Self {
        let authenticator = SessionAuthenticator::new(transport.clone(), reauth_days);
        Self {
            transport,
            authenticator,
            cache,
            session: RwLock::new(None),
            credentials: RwLock::new(None),
            inflight: DashMap::new(),
        }
    }

    /// Run the login handshake and adopt the resulting session.
    pub async fn login(&self, credentials: Credentials) -> Result<Session> {
        let session = self.authenticator.login(&credentials).await?;
        *self.session.write().await = Some(session.clone());
        *self.credentials.write().await = Some(credentials);
        Ok(session)
    }

    /// Server-side logout is best-effort; local state and the cache are
    /// cleared unconditionally.
    pub async fn logout(&self) {
        if let Some(session) = self.session.write().await.take() {
            self.authenticator.logout(&session).await;
        }
        *self.credentials.write().await = None;
        self.cache.clear().await;
        info!("local session cleared");
    }

    /// Adopt a previously persisted session after re-validating it.
    /// Returns the outcome so the caller knows whether to prompt for
    /// credentials again.
    pub async fn restore_session(&self, session: Session) -> RestoreOutcome {
        let outcome = self.authenticator.restore(&session).await;
        if outcome == RestoreOutcome::Restored {
            *self.session.write().await = Some(session);
        }
        outcome
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Trips for one date, cache-first. Concurrent calls for the same
    /// date coalesce into the in-flight scrape; different dates proceed
    /// independently.
    pub async fn get_day(&self, date: NaiveDate) -> Result<DayRoster> {
        if let Some(hit) = self.cache.get(date).await {
            debug!(%date, "cache hit");
            return Ok(hit);
        }

        let gate = self
            .inflight
            .entry(date)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = gate.lock().await;

        // whoever held the gate before us may have filled the cache
        if let Some(hit) = self.cache.get(date).await {
            debug!(%date, "cache hit after coalescing");
            return Ok(hit);
        }

        let result = self.fetch_day(date).await;
        drop(guard);
        self.inflight.remove(&date);
        result
    }

    /// Rosters for an inclusive date range, date-sorted. Days the portal
    /// confirmed empty are present with no trips.
    pub async fn get_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Roster> {
        let mut roster = Roster::new();
        let mut date = from;
        while date <= to {
            roster.insert(date, self.get_day(date).await?);
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(roster)
    }

    /// Single-day detail scrape; degrades to sentinel fields on malformed
    /// pages rather than failing.
    pub async fn get_shift_detail(&self, date: NaiveDate) -> Result<ShiftDetail> {
        let session = self.ensure_session().await?;
        match scrape::fetch_shift_detail(&self.transport, &session, date).await {
            Err(PerdisError::InvalidCredentials) => {
                self.session.write().await.take();
                Err(PerdisError::InvalidCredentials)
            }
            other => other,
        }
    }

    /// Printable shift sheet for a date, passed through as opaque bytes.
    pub async fn get_print_sheet(&self, date: NaiveDate) -> Result<Bytes> {
        let session = self.ensure_session().await?;
        scrape::fetch_print_sheet(&self.transport, &session, date).await
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<DayRoster> {
        let session = self.ensure_session().await?;

        let scraped = match scrape::fetch_listing(&self.transport, &session, Some(date)).await {
            Ok(scraped) => scraped,
            Err(PerdisError::InvalidCredentials) => {
                // the portal bounced us to the login page mid-session
                self.session.write().await.take();
                return Err(PerdisError::InvalidCredentials);
            }
            Err(err) => return Err(err),
        };

        // failures above never reach the cache; a confirmed-empty day does
        let day = scraped.get(&date).cloned().unwrap_or_default();
        for (scraped_date, trips) in &scraped {
            self.cache.put(*scraped_date, trips).await;
        }
        if !scraped.contains_key(&date) {
            self.cache.put(date, &[]).await;
        }
        Ok(day)
    }

    /// A session within the re-auth interval is trusted as-is; a stale or
    /// missing one is replaced by a fresh login from the held credentials,
    /// or the call fails with `NotAuthenticated`.
    async fn ensure_session(&self) -> Result<Session> {
        if let Some(session) = self.session.read().await.clone() {
            if session.age_days(Utc::now()) <= self.authenticator.reauth_days() {
                return Ok(session);
            }
            debug!("session past re-auth interval, discarding");
            self.session.write().await.take();
        }

        let credentials = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or(PerdisError::NotAuthenticated)?;
        let session = self.authenticator.login(&credentials).await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }
}
