//! Network primitive.

use async_trait::async_trait;
use offline_core::{BodyError, Request, Response};

/// Error type for fetch operations.
///
/// These are transport failures. A response with an error status is still a
/// successful fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("request error: {0}")]
    Request(String),

    #[error("body error: {0}")]
    Body(#[from] BodyError),
}

impl FetchError {
    /// Network failure for `url`.
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Issues requests to the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request. Resolves to any response the server sent, or an
    /// error if no response arrived.
    async fn fetch(&self, request: Request) -> Result<Response, FetchError>;
}

/// Fetcher over Spin's outbound HTTP.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct SpinFetcher;

#[cfg(target_arch = "wasm32")]
#[async_trait]
impl Fetcher for SpinFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        use offline_core::{Body, HeaderMap, StatusCode};

        let url = request.uri().to_string();
        let (method, uri, headers, body) = request.into_parts();
        let body = body.collect().await?;

        let mut builder = spin_sdk::http::Request::builder();
        builder.method(spin_method(&method)).uri(uri.to_string());
        for (name, value) in headers.iter() {
            builder.header(name.as_str(), String::from_utf8_lossy(value.as_bytes()).as_ref());
        }
        let outbound = builder.body(body.to_vec()).build();

        let resp: spin_sdk::http::Response = spin_sdk::http::send(outbound)
            .await
            .map_err(|e| FetchError::network(url.clone(), e.to_string()))?;

        let status = StatusCode::from_u16(*resp.status())
            .map_err(|e| FetchError::network(url.clone(), e.to_string()))?;
        let mut out_headers = HeaderMap::new();
        for (name, value) in resp.headers() {
            if let (Ok(name), Ok(value)) = (
                http::header::HeaderName::from_bytes(name.as_bytes()),
                http::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                out_headers.append(name, value);
            }
        }

        Ok(Response::new(status, out_headers, Body::from(resp.body().to_vec())))
    }
}

#[cfg(target_arch = "wasm32")]
fn spin_method(method: &http::Method) -> spin_sdk::http::Method {
    use spin_sdk::http::Method as M;
    match *method {
        http::Method::POST => M::Post,
        http::Method::PUT => M::Put,
        http::Method::DELETE => M::Delete,
        http::Method::PATCH => M::Patch,
        http::Method::HEAD => M::Head,
        http::Method::OPTIONS => M::Options,
        _ => M::Get,
    }
}
