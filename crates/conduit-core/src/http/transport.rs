//! The general-purpose HTTP client behind the adapter
//!
//! [`Transport`] is the seam between conduit and whatever actually moves
//! bytes. [`ReqwestTransport`] is the production implementation; tests swap
//! in recording doubles.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result, TransportError, TransportErrorKind};
use crate::http::credentials::Credentials;
use crate::http::tls::TrustContext;
use crate::http::types::{ByteStream, ResponseBody};

/// Fully resolved request handed to the transport
///
/// The URL never carries userinfo when it comes from the adapter;
/// credentials travel in `basic_auth` only.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub cancel: Option<CancellationToken>,
    pub basic_auth: Option<Credentials>,
    pub trust: Option<Arc<TrustContext>>,
    /// Return the body as a live stream instead of buffering it
    pub stream: bool,
    pub timeout: Option<Duration>,
}

impl OutboundRequest {
    /// Bare request with no body, auth or trust material
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
            body: None,
            cancel: None,
            basic_auth: None,
            trust: None,
            stream: false,
            timeout: None,
        }
    }
}

/// Response as produced by the transport
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl TransportResponse {
    /// Response with the canonical reason phrase as status text
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        }
    }
}

/// Why a transport call did not produce a 2xx response
#[derive(Debug)]
pub enum TransportFailure {
    /// The server answered with a non-2xx status
    UpstreamResponse(TransportResponse),
    /// No response was obtained
    NoResponse(TransportError),
}

impl From<TransportError> for TransportFailure {
    fn from(error: TransportError) -> Self {
        TransportFailure::NoResponse(error)
    }
}

/// Executes outbound requests
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: OutboundRequest,
    ) -> std::result::Result<TransportResponse, TransportFailure>;
}

/// Transport backed by `reqwest`
///
/// Requests without trust material share one default client. Each distinct
/// trust context gets its own client, built on first use and reused while the
/// context for that path stays byte-identical.
pub struct ReqwestTransport {
    default_client: reqwest::Client,
    trusted_clients: Mutex<HashMap<PathBuf, (Arc<TrustContext>, reqwest::Client)>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let default_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                path: None,
                source: Some(e.into()),
            })?;
        Ok(Self::with_client(default_client))
    }

    /// Use a preconfigured client for requests without trust material
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            default_client: client,
            trusted_clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(
        &self,
        trust: Option<&Arc<TrustContext>>,
    ) -> std::result::Result<reqwest::Client, TransportError> {
        let Some(trust) = trust else {
            return Ok(self.default_client.clone());
        };

        let mut clients = self
            .trusted_clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some((context, client)) = clients.get(trust.path()) {
            if context == trust {
                return Ok(client.clone());
            }
        }

        // Contexts are verified when loaded, so a failure here is unexpected
        let mut builder = reqwest::Client::builder();
        for certificate in trust
            .to_certificates()
            .map_err(|e| TransportError::new(TransportErrorKind::Tls, e))?
        {
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::new(TransportErrorKind::Tls, e))?;

        tracing::debug!(ca_cert_file = %trust.path().display(), "Built HTTP client with custom CA");
        clients.insert(trust.path().to_path_buf(), (Arc::clone(trust), client.clone()));
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: OutboundRequest,
    ) -> std::result::Result<TransportResponse, TransportFailure> {
        let OutboundRequest {
            url,
            method,
            headers,
            body,
            cancel,
            basic_auth,
            trust,
            stream,
            timeout,
        } = request;

        let client = self.client_for(trust.as_ref())?;
        let mut builder = client.request(method, url).headers(headers);
        if let Some(credentials) = basic_auth {
            builder = builder.basic_auth(credentials.username, Some(credentials.password));
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = until_cancelled(cancel.as_ref(), builder.send())
            .await?
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = if stream {
            let chunks = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from_reqwest));
            let chunks: ByteStream = match cancel {
                Some(token) => cancellable(chunks, token),
                None => Box::pin(chunks),
            };
            ResponseBody::Streaming(chunks)
        } else {
            let bytes = until_cancelled(cancel.as_ref(), response.bytes())
                .await?
                .map_err(TransportError::from_reqwest)?;
            ResponseBody::Buffered(bytes)
        };

        let response = TransportResponse::new(status, headers, body);
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportFailure::UpstreamResponse(response))
        }
    }
}

/// Run `future` unless the token fires first
async fn until_cancelled<F, T>(
    cancel: Option<&CancellationToken>,
    future: F,
) -> std::result::Result<T, TransportError>
where
    F: std::future::Future<Output = T>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(TransportError::cancelled()),
            output = future => Ok(output),
        },
        None => Ok(future.await),
    }
}

/// End the stream with a cancellation error once the token fires
///
/// Dropping the returned stream drops the underlying body and with it the
/// connection.
fn cancellable<S>(inner: S, token: CancellationToken) -> ByteStream
where
    S: Stream<Item = std::result::Result<Bytes, TransportError>> + Send + 'static,
{
    let inner: ByteStream = Box::pin(inner);
    Box::pin(futures::stream::unfold(
        Some((inner, token)),
        |state| async move {
            let (mut inner, token) = state?;
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                item = inner.next() => Some(item),
            };
            match next {
                None => Some((Err(TransportError::cancelled()), None)),
                Some(Some(item)) => Some((item, Some((inner, token)))),
                Some(None) => None,
            }
        },
    ))
}
