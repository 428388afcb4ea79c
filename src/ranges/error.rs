//! Error types for the egress range cache

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for range cache operations
pub type RangeResult<T> = Result<T, RangeError>;

/// Errors surfaced by the range cache and membership checks
///
/// Malformed rows in the source document are not errors: they are skipped
/// and counted by the parser.
#[derive(Debug, Error)]
pub enum RangeError {
    /// The input is not a syntactically valid IPv4 or IPv6 address
    #[error("invalid IP address: {input:?}")]
    InvalidAddress { input: String },

    /// The remote range list could not be retrieved or was unusable.
    /// The cache keeps serving its previous contents.
    #[error("failed to fetch ranges from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The local copy of the range list could not be read or written
    #[error("local range copy {path:?}: {source}")]
    LocalCopy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RangeError {
    pub fn invalid_address(input: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from bad user input rather than the data source
    pub fn is_invalid_address(&self) -> bool {
        matches!(self, Self::InvalidAddress { .. })
    }
}
