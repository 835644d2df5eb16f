//! Single-consume response bodies.
//!
//! A [`Body`] can be read exactly once: every reader takes it by value.
//! A response that must go both to the caller and into the cache is split
//! with [`Body::tee`] first, which is the only way to get two readers out of
//! one stream.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};

/// Error raised while reading a body stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BodyError {
    #[error("body stream failed: {0}")]
    Stream(String),

    #[error("invalid stored response: {0}")]
    InvalidStored(String),
}

/// Boxed chunk stream backing a streaming body.
pub type BodyStream = BoxStream<'static, Result<Bytes, BodyError>>;

/// A response or request body that can be consumed once.
pub struct Body {
    inner: Inner,
}

enum Inner {
    Full(Bytes),
    Stream(BodyStream),
}

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// A body whose bytes are already in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            inner: Inner::Full(bytes.into()),
        }
    }

    /// A body backed by a chunk stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BodyError>> + Send + 'static,
    {
        Self {
            inner: Inner::Stream(stream.boxed()),
        }
    }

    /// Split the body into two independent readers.
    ///
    /// Buffered bodies share their bytes. Streaming bodies pull from the
    /// source on demand and buffer chunks for whichever side is behind.
    pub fn tee(self) -> (Body, Body) {
        match self.inner {
            Inner::Full(bytes) => (Body::from_bytes(bytes.clone()), Body::from_bytes(bytes)),
            Inner::Stream(source) => {
                let shared = Arc::new(Mutex::new(TeeShared {
                    source: Some(source),
                    pending: [VecDeque::new(), VecDeque::new()],
                    wakers: [None, None],
                    dropped: [false, false],
                }));
                let left = TeeHalf {
                    shared: Arc::clone(&shared),
                    side: 0,
                };
                let right = TeeHalf { shared, side: 1 };
                (Body::from_stream(left), Body::from_stream(right))
            }
        }
    }

    /// Read the whole body into memory.
    pub async fn collect(self) -> Result<Bytes, BodyError> {
        match self.inner {
            Inner::Full(bytes) => Ok(bytes),
            Inner::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Full(bytes) => f.debug_tuple("Body::Full").field(&bytes.len()).finish(),
            Inner::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from_bytes(s)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from_bytes(s)
    }
}

struct TeeShared {
    source: Option<BodyStream>,
    pending: [VecDeque<Result<Bytes, BodyError>>; 2],
    wakers: [Option<Waker>; 2],
    dropped: [bool; 2],
}

impl TeeShared {
    fn wake(&mut self, side: usize) {
        if let Some(waker) = self.wakers[side].take() {
            waker.wake();
        }
    }
}

struct TeeHalf {
    shared: Arc<Mutex<TeeShared>>,
    side: usize,
}

impl Stream for TeeHalf {
    type Item = Result<Bytes, BodyError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let side = self.side;
        let other = 1 - side;
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(item) = shared.pending[side].pop_front() {
            return Poll::Ready(Some(item));
        }

        let Some(source) = shared.source.as_mut() else {
            return Poll::Ready(None);
        };

        match source.as_mut().poll_next(cx) {
            Poll::Ready(Some(item)) => {
                if !shared.dropped[other] {
                    shared.pending[other].push_back(item.clone());
                    shared.wake(other);
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                shared.source = None;
                shared.wake(other);
                Poll::Ready(None)
            }
            Poll::Pending => {
                // The source only keeps the latest waker; the side that
                // pulls the next chunk wakes the other one.
                shared.wakers[side] = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Drop for TeeHalf {
    fn drop(&mut self) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.dropped[self.side] = true;
        shared.pending[self.side].clear();
        shared.wake(1 - self.side);
    }
}
