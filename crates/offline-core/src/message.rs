//! Requests, live responses and stored response snapshots.

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::{Deserialize, Serialize};

use crate::body::{Body, BodyError};
use crate::key::RequestKey;

/// Header carrying how a routed response was produced.
pub const CACHE_STATUS_HEADER: &str = "x-offline-cache";

/// Error building a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// An outbound request delivered to the intermediary.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// Parse `url` and create a GET request for it.
    pub fn get(url: &str) -> Result<Self, RequestError> {
        let uri = url.parse::<Uri>().map_err(|e| RequestError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(Method::GET, uri))
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Target host name, if the URL is absolute.
    pub fn host(&self) -> Option<&str> {
        self.uri.host()
    }

    /// Whether the URL uses a scheme the cache can store (`http`/`https`).
    pub fn is_http(&self) -> bool {
        matches!(self.uri.scheme_str(), Some("http") | Some("https"))
    }

    /// Cache key for this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.uri)
    }

    /// Split into parts, consuming the body.
    pub fn into_parts(self) -> (Method, Uri, HeaderMap, Body) {
        (self.method, self.uri, self.headers, self.body)
    }
}

/// A live response. Its body can be read once.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Create a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A 200 response with the given body and no headers.
    pub fn ok(body: impl Into<Body>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body.into())
    }

    /// A response with the given status and body.
    pub fn with_status(status: StatusCode, body: impl Into<Body>) -> Self {
        Self::new(status, HeaderMap::new(), body.into())
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of the cache status header, if set.
    pub fn cache_status(&self) -> Option<&str> {
        self.header(CACHE_STATUS_HEADER)
    }

    /// Set the cache status header.
    pub fn with_cache_status(mut self, status: &'static str) -> Self {
        self.headers.insert(
            HeaderName::from_static(CACHE_STATUS_HEADER),
            HeaderValue::from_static(status),
        );
        self
    }

    /// Duplicate the response into two independent copies.
    ///
    /// Must be called before either copy's body is read; taking `self` by
    /// value makes that ordering a compile-time guarantee.
    pub fn tee(self) -> (Response, Response) {
        let (left, right) = self.body.tee();
        (
            Response::new(self.status, self.headers.clone(), left),
            Response::new(self.status, self.headers, right),
        )
    }

    /// Read the body into memory.
    pub async fn bytes(self) -> Result<Bytes, BodyError> {
        self.body.collect().await
    }

    /// Read the body as UTF-8 text (lossy).
    pub async fn text(self) -> Result<String, BodyError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// One stored header. The value keeps its raw bytes, which need not be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeader {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

impl StoredHeader {
    pub fn new(name: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        Self {
            name: name.into(),
            value: value.as_ref().to_vec(),
        }
    }
}

/// Immutable snapshot of a response, as written into a cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// HTTP status code.
    pub status: u16,
    /// Headers in response order.
    pub headers: Vec<StoredHeader>,
    /// Body bytes.
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl StoredResponse {
    /// Drain a live response into a snapshot.
    pub async fn capture(response: Response) -> Result<Self, BodyError> {
        let status = response.status.as_u16();
        let headers = response
            .headers
            .iter()
            .filter(|(name, _)| name.as_str() != CACHE_STATUS_HEADER)
            .map(|(name, value)| StoredHeader::new(name.as_str(), value.as_bytes()))
            .collect();
        let body = response.body.collect().await?.to_vec();

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Rebuild a live response from the snapshot.
    pub fn to_response(&self) -> Result<Response, BodyError> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| BodyError::InvalidStored(e.to_string()))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for header in &self.headers {
            let name = HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|e| BodyError::InvalidStored(e.to_string()))?;
            let value = HeaderValue::from_bytes(&header.value)
                .map_err(|e| BodyError::InvalidStored(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(Response::new(
            status,
            headers,
            Body::from_bytes(self.body.clone()),
        ))
    }
}

mod base64_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
