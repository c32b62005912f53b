//! HTTP response handling.
//!
//! The transport yields a [`RawResponse`]: status, headers, and a one-shot
//! body stream. [`RawResponse::into_parts`] detaches the body from the
//! metadata, leaving a [`ResponseMeta`] that can be retained and inspected
//! after the body is gone. [`RawBody`] is consumed by value — it can be
//! buffered or closed exactly once, never both.
//!
//! [`Response`] is the per-call envelope handed back to callers: a success
//! with an optional decoded body, or a protocol-level failure carrying the
//! fully buffered error payload.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;

use crate::{Error, Result};

/// A streaming body: chunks of bytes arriving over time.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

// ============================================================================
// Raw Body
// ============================================================================

/// The one-shot readable body of a [`RawResponse`].
///
/// Ownership is the access control: reading ([`RawBody::buffer`]) and closing
/// ([`RawBody::close`]) both consume the value, so double reads and
/// read-after-close cannot be expressed.
pub struct RawBody {
    stream: ByteStream,
}

impl std::fmt::Debug for RawBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBody").finish_non_exhaustive()
    }
}

impl RawBody {
    /// Creates a body from a stream of chunks.
    #[must_use]
    pub fn from_stream(stream: ByteStream) -> Self {
        Self { stream }
    }

    /// Creates a body from an already-buffered payload.
    #[must_use]
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::from_stream(Box::pin(futures_util::stream::once(
            async move { Ok(bytes) },
        )))
    }

    /// Creates an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_stream(Box::pin(futures_util::stream::empty()))
    }

    /// Reads the remaining stream to the end and returns the collected bytes.
    ///
    /// The underlying stream is dropped afterwards, so the transport
    /// connection can be recycled.
    ///
    /// # Errors
    ///
    /// Returns an error if reading any chunk fails.
    pub async fn buffer(mut self) -> Result<Bytes> {
        let mut collected = Vec::new();
        while let Some(chunk) = self.stream.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(collected))
    }

    /// Closes the body without reading it.
    pub fn close(self) {
        drop(self);
    }

    /// Wraps the body so the first mid-read I/O fault is recorded in the
    /// returned [`FaultSlot`] while still propagating to the reader.
    ///
    /// The slot lets the caller distinguish "the converter rejected the
    /// payload" from "the network failed mid-read" after a conversion
    /// attempt fails.
    #[must_use]
    pub fn observe(self) -> (Self, FaultSlot) {
        let slot = FaultSlot::default();
        let observed = FaultObserving {
            inner: self.stream,
            slot: slot.clone(),
        };
        (Self::from_stream(Box::pin(observed)), slot)
    }
}

/// Shared slot holding the first I/O fault observed while streaming a body.
#[derive(Debug, Clone, Default)]
pub struct FaultSlot {
    slot: Arc<Mutex<Option<Error>>>,
}

impl FaultSlot {
    fn record(&self, err: &Error) {
        let mut guard = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(err.mirror());
        }
    }

    /// Takes the recorded fault, if any.
    #[must_use]
    pub fn take(&self) -> Option<Error> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Stream decorator that records the first error without altering it.
struct FaultObserving {
    inner: ByteStream,
    slot: FaultSlot,
}

impl Stream for FaultObserving {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Err(err))) => {
                this.slot.record(&err);
                Poll::Ready(Some(Err(err)))
            }
            other => other,
        }
    }
}

// ============================================================================
// Raw Response
// ============================================================================

/// A raw transport response: status, headers, and the one-shot body.
#[derive(Debug)]
pub struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: RawBody,
}

impl RawResponse {
    /// Creates a raw response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: RawBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Detaches the body, leaving retainable metadata.
    #[must_use]
    pub fn into_parts(self) -> (ResponseMeta, RawBody) {
        (
            ResponseMeta {
                status: self.status,
                headers: self.headers,
            },
            self.body,
        )
    }
}

/// Response metadata with the body stripped: safe to retain and inspect
/// after the body stream has been consumed or closed.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    status: u16,
    headers: HashMap<String, String>,
}

impl ResponseMeta {
    /// Creates response metadata.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>) -> Self {
        Self { status, headers }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

/// The result envelope of a completed call.
///
/// Pairs the raw transport metadata with either a decoded body (success,
/// possibly absent) or the fully buffered error payload (protocol failure).
/// A success envelope never retains a handle to the transport stream; an
/// error payload is materialized, so it can be read any number of times.
#[derive(Debug)]
pub struct Response<T> {
    meta: ResponseMeta,
    outcome: Outcome<T>,
}

#[derive(Debug)]
enum Outcome<T> {
    Success(Option<T>),
    Failure(Bytes),
}

impl<T> Response<T> {
    /// Creates a success envelope.
    ///
    /// Expected to be paired with 2xx metadata; the response parser always
    /// upholds this, and mock constructions should too.
    #[must_use]
    pub fn success(body: Option<T>, meta: ResponseMeta) -> Self {
        Self {
            meta,
            outcome: Outcome::Success(body),
        }
    }

    /// Creates an error envelope from a fully buffered payload.
    #[must_use]
    pub fn error(payload: Bytes, meta: ResponseMeta) -> Self {
        Self {
            meta,
            outcome: Outcome::Failure(payload),
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.meta.status()
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        self.meta.headers()
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.meta.header(name)
    }

    /// The body-stripped transport metadata.
    #[must_use]
    pub const fn raw(&self) -> &ResponseMeta {
        &self.meta
    }

    /// Whether this is a success envelope.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// The decoded body of a success envelope, if present.
    #[must_use]
    pub const fn body(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Success(body) => body.as_ref(),
            Outcome::Failure(_) => None,
        }
    }

    /// Consume into the decoded body, if present.
    #[must_use]
    pub fn into_body(self) -> Option<T> {
        match self.outcome {
            Outcome::Success(body) => body,
            Outcome::Failure(_) => None,
        }
    }

    /// The buffered payload of an error envelope.
    #[must_use]
    pub const fn error_body(&self) -> Option<&Bytes> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(payload) => Some(payload),
        }
    }

    /// Consume into the buffered error payload.
    #[must_use]
    pub fn into_error_body(self) -> Option<Bytes> {
        match self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(payload) => Some(payload),
        }
    }

    /// Fallible body transformation, leaving metadata and error payloads
    /// untouched.
    pub(crate) fn try_map_body<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Response<U>> {
        let outcome = match self.outcome {
            Outcome::Success(Some(value)) => Outcome::Success(Some(f(value)?)),
            Outcome::Success(None) => Outcome::Success(None),
            Outcome::Failure(payload) => Outcome::Failure(payload),
        };
        Ok(Response {
            meta: self.meta,
            outcome,
        })
    }
}
