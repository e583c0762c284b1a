//! Byte-level transport used by the pulling adapters.
//!
//! `Fetch` is the seam between adapters and the network: `HttpFetcher` performs a
//! blocking HTTP GET with a per-request deadline, tests substitute canned bodies.

use std::time::Duration;

use log::debug;
use pulse_common::{PulseError, Result};
use reqwest::blocking::Client;

/// Header carrying a source's credential.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Retrieves the raw body behind a URL.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str, credential: Option<&str>) -> Result<Vec<u8>>;
}

/// Blocking HTTP client shared by every pull.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pulse_server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PulseError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, credential: Option<&str>) -> Result<Vec<u8>> {
        let fetch_err = |e: reqwest::Error| PulseError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut request = self.client.get(url);
        if let Some(key) = credential {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(fetch_err)?;
        let body = response.bytes().map_err(fetch_err)?;
        debug!("Fetched {} byte(s) from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
