//! Error types for the conduit transport layer
//!
//! The taxonomy separates three outcomes a caller must be able to tell apart:
//! a local configuration problem raised before any network I/O, a transport
//! failure where no response was ever received, and everything else. Upstream
//! HTTP errors (non-2xx) are not errors here: they are returned as normal
//! responses.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for conduit operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local configuration problems (unreadable CA file, invalid settings)
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// URL could not be parsed. The URL is stored with userinfo redacted.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Userinfo in a URL could not be percent-decoded
    #[error("Credential decode error: {message}")]
    CredentialDecode { message: String },

    /// Header name or value cannot be sent on the wire
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    /// No response was obtained from the server
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error without an underlying cause
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Whether the request never produced a response
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Whether the request was aborted through its cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Transport(e) if e.kind() == TransportErrorKind::Cancelled)
    }

    /// Whether the request ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(e) if e.kind() == TransportErrorKind::Timeout)
    }

    /// The transport failure, if this error is one
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Error::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Classification of failures where no response was received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established
    Connect,
    /// Request or connect timeout elapsed
    Timeout,
    /// Caller cancelled the request
    Cancelled,
    /// Response body could not be read
    Body,
    /// TLS client could not be configured from the trust material
    Tls,
    /// Request could not be built or sent
    Request,
    /// Anything else
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Cancelled => write!(f, "cancelled"),
            TransportErrorKind::Body => write!(f, "body"),
            TransportErrorKind::Tls => write!(f, "tls"),
            TransportErrorKind::Request => write!(f, "request"),
            TransportErrorKind::Other => write!(f, "other"),
        }
    }
}

/// A failure that carries no HTTP response
///
/// The original error from the HTTP client is kept as the source so callers
/// can downcast to it.
#[derive(Debug, Error)]
#[error("Transport {kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Wrap an underlying error with a classification
    pub fn new<E>(kind: TransportErrorKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an error without an underlying cause
    pub fn msg(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// The request was aborted by its cancellation token
    pub fn cancelled() -> Self {
        Self::msg(TransportErrorKind::Cancelled, "request was cancelled")
    }

    /// Classify a reqwest error
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else if error.is_request() || error.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
