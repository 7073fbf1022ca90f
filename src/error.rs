//! Error taxonomy for the roster acquisition pipeline.
//!
//! Transport and authentication failures are surfaced to the caller and
//! never retried automatically. Scrape-level extraction failures are not
//! errors at all; fields degrade to the `"?"` sentinel instead. Cache
//! store failures are logged and treated as a miss.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerdisError {
    #[error("request to the legacy portal timed out")]
    TransportTimeout,

    #[error("network error talking to the legacy portal: {0}")]
    Transport(String),

    #[error("legacy portal did not issue a session cookie")]
    NoSessionCookie,

    #[error("username or password rejected by the legacy portal")]
    InvalidCredentials,

    #[error("transport failure while submitting credentials: {0}")]
    AuthTransportFailure(String),

    #[error("no authenticated session and no credentials to establish one")]
    NotAuthenticated,

    #[error("not an allowed PERDIS server: {0}")]
    HostNotAllowed(String),

    #[error("cache store unavailable: {0}")]
    CacheUnavailable(String),
}

pub type Result<T> = std::result::Result<T, PerdisError>;
