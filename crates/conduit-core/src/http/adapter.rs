//! Fetch adapter for endpoints the default transport cannot reach
//!
//! The adapter strips credentials embedded in the URL and sends them as basic
//! auth, attaches custom CA trust for https targets, passes event streams
//! through untouched, and maps every outcome back onto
//! [`ResponseDescriptor`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::Instrument;
use url::Url;

use crate::config::TransportEnv;
use crate::error::{Error, Result};
use crate::http::credentials::{clear_userinfo, extract_credentials, Credentials};
use crate::http::tls::TlsResolver;
use crate::http::transport::{
    OutboundRequest, ReqwestTransport, Transport, TransportFailure, TransportResponse,
};
use crate::http::types::{accepts_event_stream, to_header_map, RequestDescriptor, ResponseDescriptor};
use crate::logging::{redact_sensitive, redact_url};

/// Fetch-style entry point used by model clients
///
/// The client library calls this for every request it makes. Upstream error
/// statuses come back as `Ok`; only a missing response is an `Err`.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, url: &str, request: RequestDescriptor) -> Result<ResponseDescriptor>;
}

/// The adapter
///
/// Stateless per call; safe to share behind an `Arc` between concurrent
/// requests.
pub struct FetchAdapter {
    transport: Arc<dyn Transport>,
    tls: TlsResolver,
}

impl FetchAdapter {
    /// Adapter over a fresh reqwest transport
    pub fn new(env: &TransportEnv) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(ReqwestTransport::new()?), env))
    }

    /// Adapter over an existing transport
    pub fn with_transport(transport: Arc<dyn Transport>, env: &TransportEnv) -> Self {
        Self {
            transport,
            tls: TlsResolver::new(env),
        }
    }

    pub fn tls_resolver(&self) -> &TlsResolver {
        &self.tls
    }

    /// Send `request` to `url`
    ///
    /// Credentials passed in take precedence over any userinfo in the URL;
    /// either way the URL is cleaned before dispatch.
    pub async fn adapt(
        &self,
        url: &str,
        request: RequestDescriptor,
        credentials: Option<Credentials>,
    ) -> Result<ResponseDescriptor> {
        let (target, credentials) = match credentials {
            // Userinfo is only removed, never decoded
            Some(credentials) => {
                let mut target = parse_url(url)?;
                clear_userinfo(&mut target)?;
                (target, Some(credentials))
            }
            None => {
                let extracted = extract_credentials(url)?;
                (parse_url(&extracted.url)?, extracted.credentials)
            }
        };

        let RequestDescriptor {
            method,
            mut headers,
            body,
            cancel,
            timeout,
        } = request;

        if credentials.is_some() {
            strip_authorization(&mut headers);
        }
        let stream = accepts_event_stream(&headers);
        let trust = self.tls.resolve(&target)?;
        let method = method.unwrap_or(Method::GET);

        let span = tracing::debug_span!(
            "fetch",
            method = %method,
            url = %target,
            stream,
            basic_auth = credentials.is_some(),
            custom_ca = trust.is_some(),
        );

        let outbound = OutboundRequest {
            url: target,
            method,
            headers: to_header_map(&headers)?,
            body,
            cancel,
            basic_auth: credentials,
            trust,
            stream,
            timeout,
        };

        let result = self.transport.send(outbound).instrument(span.clone()).await;
        span.in_scope(|| into_response_descriptor(result))
    }
}

#[async_trait]
impl HttpFetch for FetchAdapter {
    async fn fetch(&self, url: &str, request: RequestDescriptor) -> Result<ResponseDescriptor> {
        self.adapt(url, request, None).await
    }
}

/// The platform default path: no credential extraction, no custom trust
///
/// Streaming still follows the `Accept` header so event streams work the same
/// way through either path.
pub struct DirectFetch {
    transport: Arc<dyn Transport>,
}

impl DirectFetch {
    pub fn new() -> Result<Self> {
        Ok(Self::with_transport(Arc::new(ReqwestTransport::new()?)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl HttpFetch for DirectFetch {
    async fn fetch(&self, url: &str, request: RequestDescriptor) -> Result<ResponseDescriptor> {
        let target = parse_url(url)?;
        let outbound = OutboundRequest {
            url: target,
            method: request.method.clone().unwrap_or(Method::GET),
            headers: to_header_map(&request.headers)?,
            stream: request.wants_event_stream(),
            body: request.body,
            cancel: request.cancel,
            basic_auth: None,
            trust: None,
            timeout: request.timeout,
        };
        into_response_descriptor(self.transport.send(outbound).await)
    }
}

/// Map a transport outcome onto the response contract
///
/// An upstream error status is a normal response. A failure without a
/// response is returned unchanged as [`Error::Transport`].
pub fn into_response_descriptor(
    result: std::result::Result<TransportResponse, TransportFailure>,
) -> Result<ResponseDescriptor> {
    match result {
        Ok(response) => Ok(to_descriptor(response)),
        Err(TransportFailure::UpstreamResponse(response)) => {
            let descriptor = to_descriptor(response);
            match descriptor.text() {
                Some(text) => tracing::debug!(
                    status = descriptor.status.as_u16(),
                    body = %redact_sensitive(&truncate(&text, 512)),
                    "Upstream returned error status"
                ),
                None => tracing::debug!(
                    status = descriptor.status.as_u16(),
                    "Upstream returned error status on a stream"
                ),
            }
            Ok(descriptor)
        }
        Err(TransportFailure::NoResponse(error)) => {
            tracing::debug!(kind = %error.kind(), error = %error, "No response from upstream");
            Err(Error::Transport(error))
        }
    }
}

fn to_descriptor(response: TransportResponse) -> ResponseDescriptor {
    // Rebuilt entry by entry so repeated header values stay repeated
    let mut headers = HeaderMap::with_capacity(response.headers.len());
    for (name, value) in response.headers.iter() {
        headers.append(name.clone(), value.clone());
    }
    ResponseDescriptor {
        status: response.status,
        status_text: response.status_text,
        headers,
        body: response.body,
    }
}

/// Remove every casing of the `Authorization` header
fn strip_authorization(headers: &mut HashMap<String, String>) {
    headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| Error::InvalidUrl {
        url: redact_url(raw),
        source,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
