//! Request and response descriptors exchanged with the model client
//!
//! These mirror the fetch-style contract the client library speaks: a request
//! descriptor in, a response with status, headers and body out.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result, TransportError};

/// Media type that switches a request into streaming mode
pub const EVENT_STREAM: &str = "text/event-stream";

/// Live, pull-based sequence of body chunks
pub type ByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, TransportError>> + Send + 'static>>;

/// Outgoing request as the client library describes it
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    /// HTTP method, GET when unset
    pub method: Option<Method>,
    /// Header names are matched case-insensitively
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Cooperative cancellation for the in-flight call
    pub cancel: Option<CancellationToken>,
    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get() -> Self {
        Self::new().method(Method::GET)
    }

    pub fn post() -> Self {
        Self::new().method(Method::POST)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize a JSON body and set `Content-Type` unless already present
    pub fn json(mut self, value: &serde_json::Value) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(|e| Error::Internal {
            message: "Failed to serialize request body".to_string(),
            source: e.into(),
        })?;
        if self.header_value("content-type").is_none() {
            self.headers
                .insert("Content-Type".to_string(), "application/json".to_string());
        }
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Case-insensitive header lookup
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether `Accept` asks for an event stream
    pub fn wants_event_stream(&self) -> bool {
        accepts_event_stream(&self.headers)
    }
}

pub(crate) fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// `Accept` equals `text/event-stream`, ignoring case and surrounding space
pub fn accepts_event_stream(headers: &HashMap<String, String>) -> bool {
    find_header(headers, "accept")
        .map(|value| value.trim().eq_ignore_ascii_case(EVENT_STREAM))
        .unwrap_or(false)
}

/// Convert descriptor headers into a wire header map
pub fn to_header_map(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
            name: name.clone(),
            message: e.to_string(),
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

/// Response body: fully buffered or a live stream, never both
pub enum ResponseBody {
    Buffered(Bytes),
    Streaming(ByteStream),
}

impl ResponseBody {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ResponseBody::Streaming(_))
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            ResponseBody::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Response handed back to the client library
///
/// Non-2xx statuses arrive here too; only a missing response is an error.
#[derive(Debug)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub status_text: String,
    /// Supports repeated keys
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ResponseDescriptor {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_streaming(&self) -> bool {
        self.body.is_streaming()
    }

    /// Buffered body as text; `None` for streaming responses
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match &self.body {
            ResponseBody::Buffered(bytes) => Some(String::from_utf8_lossy(bytes)),
            ResponseBody::Streaming(_) => None,
        }
    }

    /// Collect the whole body, draining the stream if there is one
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Streaming(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    /// Body as a stream; a buffered body becomes a single chunk
    pub fn into_stream(self) -> ByteStream {
        match self.body {
            ResponseBody::Streaming(stream) => stream,
            ResponseBody::Buffered(bytes) => {
                Box::pin(futures::stream::once(async move { Ok::<_, TransportError>(bytes) }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_stream_detection() {
        let request = RequestDescriptor::get().header("accept", "Text/Event-Stream");
        assert!(request.wants_event_stream());

        let request = RequestDescriptor::get().header("ACCEPT", " text/event-stream ");
        assert!(request.wants_event_stream());

        let request = RequestDescriptor::get().header("Accept", "application/json");
        assert!(!request.wants_event_stream());

        let request = RequestDescriptor::get().header("Accept", "text/event-stream, application/json");
        assert!(!request.wants_event_stream());

        assert!(!RequestDescriptor::get().wants_event_stream());
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = RequestDescriptor::post()
            .json(&serde_json::json!({"model": "llama3"}))
            .unwrap();
        assert_eq!(request.header_value("Content-Type"), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(&b"{\"model\":\"llama3\"}"[..]));

        let request = RequestDescriptor::post()
            .header("content-type", "application/vnd.custom+json")
            .json(&serde_json::json!({}))
            .unwrap();
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header_value("CONTENT-TYPE"), Some("application/vnd.custom+json"));
    }

    #[test]
    fn test_to_header_map_rejects_invalid_names() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let err = to_header_map(&headers).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { ref name, .. } if name == "bad header"));

        let mut headers = HashMap::new();
        headers.insert("X-Trace".to_string(), "abc".to_string());
        let map = to_header_map(&headers).unwrap();
        assert_eq!(map.get("x-trace").unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_into_bytes_collects_stream() {
        let chunks: Vec<std::result::Result<Bytes, TransportError>> =
            vec![Ok(Bytes::from("data: a\n\n")), Ok(Bytes::from("data: b\n\n"))];
        let response = ResponseDescriptor {
            status: StatusCode::OK,
            status_text: "OK".to_string(),
            headers: HeaderMap::new(),
            body: ResponseBody::Streaming(Box::pin(futures::stream::iter(chunks))),
        };
        assert!(response.is_streaming());
        assert!(response.text().is_none());
        assert_eq!(response.into_bytes().await.unwrap(), "data: a\n\ndata: b\n\n");
    }

    #[tokio::test]
    async fn test_buffered_into_stream() {
        let response = ResponseDescriptor {
            status: StatusCode::NOT_FOUND,
            status_text: "Not Found".to_string(),
            headers: HeaderMap::new(),
            body: ResponseBody::Buffered(Bytes::from("Not Found")),
        };
        assert!(!response.is_success());
        assert_eq!(response.text().as_deref(), Some("Not Found"));

        let chunks: Vec<_> = response.into_stream().collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), "Not Found");
    }
}
