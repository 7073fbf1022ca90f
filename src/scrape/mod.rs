//! Scraping of legacy roster pages into the normalized data model.
//!
//! The portal has no API; everything comes out of server-rendered HTML.
//! Two page shapes exist: a multi-day listing (`roster.aspx`) and a
//! single-day shift detail (`shift.aspx`). The parsers here are pure
//! functions of their HTML input so they can be pinned against recorded
//! fixture pages; the thin `fetch_*` wrappers at the bottom do the network
//! hop and nothing else.
//!
//! The row-shape contract for the listing (cell order
//! `[date, line, start, end, location]`, data rows have at least five
//! cells) is reconstructed from the deployed parsers; validate against
//! freshly captured pages before pointing this at a new PERDIS host.

use bytes::Bytes;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::auth::looks_like_login_page;
use crate::error::{PerdisError, Result};
use crate::model::{Roster, Session, ShiftDetail, Trip, UNKNOWN};
use crate::transport::LegacyTransport;

/// Multi-day roster listing.
pub const LISTING_PATH: &str = "/WebComm/roster.aspx";
/// Single-day shift detail.
pub const SHIFT_PATH: &str = "/WebComm/shift.aspx";
/// Printable shift sheet (PDF binary, opaque to this crate).
pub const PRINT_PATH: &str = "/WebComm/shiprint.aspx";

lazy_static! {
    static ref TABLE_RE: Regex = Regex::new(r"(?is)<table[^>]*>(.*?)</table>").unwrap();
    static ref ROW_RE: Regex = Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap();
    static ref CELL_RE: Regex = Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref DATE_DMY_RE: Regex = Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap();
    static ref DATE_ISO_RE: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap();
    static ref TIME_RANGE_RE: Regex =
        Regex::new(r"(\d{1,2}:\d{2})\s*-\s*(\d{1,2}:\d{2})").unwrap();
    static ref LINE_LABEL_RE: Regex = Regex::new(r"(?i)linie\D*?(\d+)").unwrap();
}

/// Parse a date cell. Tries `DD.MM.YYYY` first, then `YYYY-MM-DD`; the
/// first pattern that matches wins. Anything else, including impossible
/// calendar dates, is `None`, and the caller drops the row.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Some(caps) = DATE_DMY_RE.captures(s) {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Some(caps) = DATE_ISO_RE.captures(s) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    None
}

/// Normalize a time cell to zero-padded 24-hour `HH:MM`, or the unknown
/// sentinel when the cell does not hold a valid time.
pub fn normalize_time(s: &str) -> String {
    let s = s.trim();
    if let Some(caps) = TIME_RE.captures(s) {
        let hours: u32 = caps[1].parse().unwrap_or(99);
        let minutes: u32 = caps[2].parse().unwrap_or(99);
        if hours < 24 && minutes < 60 {
            return format!("{:02}:{:02}", hours, minutes);
        }
    }
    UNKNOWN.to_string()
}

/// Flatten a fragment of HTML to text: tags stripped, the handful of
/// entities the portal actually emits decoded, whitespace collapsed.
fn flatten(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    WS_RE.replace_all(&text, " ").trim().to_string()
}

fn cell_or_unknown(cell: &str) -> String {
    if cell.is_empty() {
        UNKNOWN.to_string()
    } else {
        cell.to_string()
    }
}

/// Extract every data row of every table in a roster-listing page.
///
/// A row is data iff it has at least five cells, a non-empty first cell,
/// and the first cell does not contain the word "Datum". Rows whose date
/// cell does not parse are decorative and dropped silently. Trip order
/// within a day is row encounter order.
pub fn parse_listing(html: &str) -> Roster {
    let mut roster = Roster::new();
    let mut rows = 0usize;

    for table in TABLE_RE.captures_iter(html) {
        for row in ROW_RE.captures_iter(&table[1]) {
            let cells: Vec<String> = CELL_RE
                .captures_iter(&row[1])
                .map(|c| flatten(&c[1]))
                .collect();

            if cells.len() < 5 || cells[0].is_empty() {
                continue;
            }
            if cells[0].to_lowercase().contains("datum") {
                continue;
            }
            let Some(date) = parse_date(&cells[0]) else {
                continue;
            };

            roster.entry(date).or_default().push(Trip {
                line: cell_or_unknown(&cells[1]),
                start: normalize_time(&cells[2]),
                end: normalize_time(&cells[3]),
                location: cell_or_unknown(&cells[4]),
            });
            rows += 1;
        }
    }

    debug!(rows, days = roster.len(), "parsed roster listing");
    roster
}

/// Extract start/end and line id from a single-day shift-detail page.
///
/// The page shape is looser than the listing: the first `HH:MM - HH:MM`
/// substring of the flattened text is the duty span, and the first integer
/// after the label "Linie" is the line. A malformed page degrades to
/// sentinels instead of failing the surrounding roster fetch.
pub fn parse_shift_detail(html: &str) -> ShiftDetail {
    let text = flatten(html);

    let (start, end) = match TIME_RANGE_RE.captures(&text) {
        Some(caps) => (normalize_time(&caps[1]), normalize_time(&caps[2])),
        None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };

    let line = LINE_LABEL_RE
        .captures(&text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    ShiftDetail { line, start, end }
}

/// Fetch and parse the roster listing, optionally centered on a date.
///
/// A bounce back to the login page means the session is no longer
/// accepted; that surfaces as `InvalidCredentials` so the caller can
/// discard the session instead of caching an empty day.
pub async fn fetch_listing(
    transport: &LegacyTransport,
    session: &Session,
    date: Option<NaiveDate>,
) -> Result<Roster> {
    let path = match date {
        Some(date) => format!("{}?date={}", LISTING_PATH, date),
        None => LISTING_PATH.to_string(),
    };
    let response = transport
        .get(&session.profile, &path, Some(&session.cookie))
        .await?;
    if response.status != 200 {
        return Err(PerdisError::Transport(format!(
            "roster listing returned status {}",
            response.status
        )));
    }
    if looks_like_login_page(&response.body) {
        return Err(PerdisError::InvalidCredentials);
    }
    Ok(parse_listing(&response.body))
}

/// Fetch and parse the shift-detail page for one date.
pub async fn fetch_shift_detail(
    transport: &LegacyTransport,
    session: &Session,
    date: NaiveDate,
) -> Result<ShiftDetail> {
    let path = format!("{}?{}", SHIFT_PATH, date);
    let response = transport
        .get(&session.profile, &path, Some(&session.cookie))
        .await?;
    if response.status != 200 {
        return Err(PerdisError::Transport(format!(
            "shift detail returned status {}",
            response.status
        )));
    }
    if looks_like_login_page(&response.body) {
        return Err(PerdisError::InvalidCredentials);
    }
    Ok(parse_shift_detail(&response.body))
}

/// Fetch the printable shift sheet for one date as opaque bytes.
pub async fn fetch_print_sheet(
    transport: &LegacyTransport,
    session: &Session,
    date: NaiveDate,
) -> Result<Bytes> {
    let path = format!("{}?{}", PRINT_PATH, date);
    transport
        .get_bytes(&session.profile, &path, Some(&session.cookie))
        .await
}
