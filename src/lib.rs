pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod scrape;
pub mod service;
pub mod transport;

pub use error::{PerdisError, Result};

use std::time::Duration;

use config::Config;
use model::ServerDirectory;
use transport::LegacyTransport;

/// Shared state of the proxy process: configuration, the outbound client
/// and the host allow-list. The proxy itself is stateless per request:
/// no credentials or sessions are retained between calls.
pub struct AppState {
    pub config: Config,
    pub transport: LegacyTransport,
    pub directory: ServerDirectory,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let transport =
            LegacyTransport::new(Duration::from_secs(config.legacy.request_timeout_secs))?;
        let directory = ServerDirectory::new(config.legacy.extra_servers.clone());
        Ok(Self {
            config,
            transport,
            directory,
        })
    }
}
