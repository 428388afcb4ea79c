//! Remote origin of the egress range list

use std::time::Duration;
use tracing::debug;

use super::error::{RangeError, RangeResult};

/// Published iCloud Private Relay egress ranges
pub const DEFAULT_RANGES_URL: &str = "https://mask-api.icloud.com/egress-ip-ranges.csv";

/// Default timeout for fetching the range list
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the size of a fetched range document
const MAX_DOCUMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Somewhere the raw range document can be fetched from
pub trait RangeSource: Send + Sync {
    /// Location reported in logs and errors
    fn url(&self) -> &str;

    /// Fetch the whole document
    fn fetch(&self) -> RangeResult<String>;
}

/// Fetches the range document over HTTP(S)
pub struct HttpRangeSource {
    url: String,
    agent: ureq::Agent,
}

impl HttpRangeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl Default for HttpRangeSource {
    fn default() -> Self {
        Self::new(DEFAULT_RANGES_URL, DEFAULT_FETCH_TIMEOUT)
    }
}

impl RangeSource for HttpRangeSource {
    fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> RangeResult<String> {
        debug!("Fetching range list from {}", self.url);
        let mut resp = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| RangeError::fetch(&self.url, e))?;

        resp.body_mut()
            .with_config()
            .limit(MAX_DOCUMENT_SIZE)
            .read_to_string()
            .map_err(|e| RangeError::fetch(&self.url, e))
    }
}
