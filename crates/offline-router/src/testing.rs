//! Scripted network for tests and local simulation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use http::header::{HeaderValue, CONTENT_TYPE};
use offline_core::{Body, BodyError, HeaderMap, Request, Response, StatusCode};

use crate::fetch::{FetchError, Fetcher};

#[derive(Debug, Clone)]
enum Script {
    Respond {
        status: StatusCode,
        content_type: Option<&'static str>,
        chunks: Vec<Bytes>,
    },
    Fail(String),
}

/// What to do with URLs that have no script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unscripted {
    /// Fail like an unreachable host.
    Fail,
    /// Answer 200 with a body naming the URL.
    Echo,
}

/// [`Fetcher`] returning canned responses and counting calls.
#[derive(Debug)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    unscripted: Unscripted,
    offline: AtomicBool,
    calls: AtomicU64,
    log: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    /// A network where only scripted URLs answer.
    pub fn new() -> Self {
        Self::with_unscripted(Unscripted::Fail)
    }

    /// A network that answers every URL.
    pub fn echo() -> Self {
        Self::with_unscripted(Unscripted::Echo)
    }

    fn with_unscripted(unscripted: Unscripted) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            unscripted,
            offline: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answer `url` with `status` and `body`.
    pub fn respond(&self, url: &str, status: StatusCode, body: impl Into<Vec<u8>>) -> &Self {
        self.script(
            url,
            Script::Respond {
                status,
                content_type: None,
                chunks: vec![Bytes::from(Into::<Vec<u8>>::into(body))],
            },
        )
    }

    /// Answer `url` with 200 and a body delivered in several chunks.
    pub fn respond_chunked(&self, url: &str, chunks: &[&str]) -> &Self {
        self.script(
            url,
            Script::Respond {
                status: StatusCode::OK,
                content_type: Some("text/plain"),
                chunks: chunks
                    .iter()
                    .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                    .collect(),
            },
        )
    }

    /// Fail every fetch of `url`.
    pub fn fail(&self, url: &str, reason: &str) -> &Self {
        self.script(url, Script::Fail(reason.to_string()))
    }

    /// Take the whole network down (or bring it back).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total fetch calls.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetch calls for one URL.
    pub fn calls_to(&self, url: &str) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    fn script(&self, url: &str, script: Script) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), script);
        self
    }

    fn lookup(&self, url: &str) -> Script {
        let scripted = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned();

        scripted.unwrap_or_else(|| match self.unscripted {
            Unscripted::Fail => Script::Fail("host unreachable".to_string()),
            Unscripted::Echo => Script::Respond {
                status: StatusCode::OK,
                content_type: Some("text/plain"),
                chunks: vec![Bytes::from(format!("network: {}", url))],
            },
        })
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        let url = request.uri().to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::network(url, "offline"));
        }

        match self.lookup(&url) {
            Script::Fail(reason) => Err(FetchError::network(url, reason)),
            Script::Respond {
                status,
                content_type,
                chunks,
            } => {
                let mut headers = HeaderMap::new();
                if let Some(ct) = content_type {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
                }
                let body = if chunks.len() == 1 {
                    Body::from_bytes(chunks.into_iter().next().unwrap_or_default())
                } else {
                    let items: Vec<Result<Bytes, BodyError>> = chunks.into_iter().map(Ok).collect();
                    Body::from_stream(stream::iter(items))
                };
                Ok(Response::new(status, headers, body))
            }
        }
    }
}
