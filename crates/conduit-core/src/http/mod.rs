//! HTTP adapter layer
//!
//! - Credential extraction from URL userinfo
//! - Custom CA trust resolution for https targets
//! - The fetch adapter and the default direct path
//! - The transport seam and its reqwest implementation

pub mod adapter;
pub mod credentials;
pub mod tls;
pub mod transport;
pub mod types;

pub use adapter::{into_response_descriptor, DirectFetch, FetchAdapter, HttpFetch};
pub use credentials::{clear_userinfo, extract_credentials, has_userinfo, Credentials, ExtractedUrl};
pub use tls::{CertificateFormat, TlsResolver, TrustContext};
pub use transport::{
    OutboundRequest, ReqwestTransport, Transport, TransportFailure, TransportResponse,
};
pub use types::{
    accepts_event_stream, ByteStream, RequestDescriptor, ResponseBody, ResponseDescriptor,
    EVENT_STREAM,
};

// Re-export commonly used types
pub use reqwest::header::HeaderMap;
pub use reqwest::{Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
