//! Shared data model for the roster pipeline.
//!
//! Dates are `chrono::NaiveDate` everywhere inside the crate and serialize
//! as ISO `YYYY-MM-DD` strings on the wire. Times inside a [`Trip`] are
//! plain `HH:MM` strings because the legacy portal has no timezone notion
//! worth modeling; absent values carry the [`UNKNOWN`] sentinel instead of
//! being fabricated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PerdisError;

/// Sentinel for a field the legacy page did not yield.
pub const UNKNOWN: &str = "?";

/// One known PERDIS deployment. Immutable once constructed; the only way
/// to obtain one for an arbitrary URL is [`ServerDirectory::resolve`],
/// which doubles as the outbound allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfile {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
}

impl ServerProfile {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            id: id.into(),
            display_name: display_name.into(),
            base_url,
        }
    }
}

/// The set of legacy hosts this process is allowed to talk to.
///
/// Ships with the four known public PERDIS deployments; deployments
/// fronting a mirror (and the test suite fronting a fixture server) can
/// extend it through configuration.
#[derive(Debug, Clone)]
pub struct ServerDirectory {
    profiles: Vec<ServerProfile>,
}

impl ServerDirectory {
    pub fn builtin() -> Vec<ServerProfile> {
        vec![
            ServerProfile::new("verkehrs-ag", "Verkehrs-AG", "https://perdisweb.verkehrs-ag.de"),
            ServerProfile::new("regiobus", "RegioBus", "https://perdis.regiobus.de"),
            ServerProfile::new(
                "bielefeld",
                "Stadtwerke Bielefeld",
                "https://anwendungen.stadtwerke-bielefeld.de",
            ),
            ServerProfile::new("frankfurt", "ICB Frankfurt", "https://perdis-info.icb-ffm.de"),
        ]
    }

    pub fn new(extra: impl IntoIterator<Item = ServerProfile>) -> Self {
        let mut profiles = Self::builtin();
        // re-normalize: configured entries may carry a trailing slash
        profiles.extend(
            extra
                .into_iter()
                .map(|p| ServerProfile::new(p.id, p.display_name, p.base_url)),
        );
        Self { profiles }
    }

    /// Resolve a caller-supplied base URL against the allow-list.
    ///
    /// This is the single gate that keeps the proxy from being used as an
    /// open relay: every outbound request targets a profile that came
    /// through here or is one of the built-ins.
    pub fn resolve(&self, url: &str) -> Result<&ServerProfile, PerdisError> {
        let wanted = url.trim_end_matches('/');
        self.profiles
            .iter()
            .find(|p| p.base_url.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PerdisError::HostNotAllowed(url.to_string()))
    }

    /// First configured profile, used when a request omits the server URL
    /// (the single-tenant deployments never send one).
    pub fn default_profile(&self) -> &ServerProfile {
        &self.profiles[0]
    }

    pub fn profiles(&self) -> &[ServerProfile] {
        &self.profiles
    }
}

impl Default for ServerDirectory {
    fn default() -> Self {
        Self::new([])
    }
}

/// Login credentials. Held in memory only for the lifetime of a session;
/// never persisted in plaintext.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub profile: ServerProfile,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("profile", &self.profile.id)
            .finish()
    }
}

/// An established legacy session: the opaque cookie token, the profile it
/// was established against (it is not usable anywhere else) and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub cookie: String,
    pub profile: ServerProfile,
    pub established_at: DateTime<Utc>,
}

impl Session {
    /// Whole days since the session was established, measured from
    /// establishment, not from last use.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.established_at).num_days()
    }
}

/// One scheduled line-service segment (a "Fahrt").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub line: String,
    pub start: String,
    pub end: String,
    pub location: String,
}

/// Trips of one calendar day, in scrape order. An empty `DayRoster` means
/// "confirmed no duties"; "not yet fetched" is the absence of the date key
/// in the surrounding [`Roster`].
pub type DayRoster = Vec<Trip>;

/// Multi-day roster. `BTreeMap` keeps iteration date-sorted for display.
pub type Roster = BTreeMap<NaiveDate, DayRoster>;

/// Result of a single-day shift-detail scrape. Every field degrades to
/// [`UNKNOWN`] when the page does not yield it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDetail {
    pub line: String,
    pub start: String,
    pub end: String,
}
