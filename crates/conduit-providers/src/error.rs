//! Error types for client construction

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for provider operations
#[derive(Debug, Error)]
pub enum Error {
    /// Error from the transport layer
    #[error(transparent)]
    Core(#[from] conduit_core::Error),

    /// The configured base URL does not parse. The URL is stored redacted.
    #[error("Invalid base URL for provider '{provider}': {url} ({source})")]
    InvalidBaseUrl {
        provider: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl Error {
    /// The transport-layer error, if this wraps one
    pub fn as_core(&self) -> Option<&conduit_core::Error> {
        match self {
            Error::Core(e) => Some(e),
            Error::InvalidBaseUrl { .. } => None,
        }
    }
}
