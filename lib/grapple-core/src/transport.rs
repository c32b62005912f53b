//! The transport seam.
//!
//! A [`Transport`] turns a built [`Request`] into an in-flight
//! [`TransportCall`]: the one object that can be driven (once) and canceled.
//! The framework never performs socket I/O itself; everything below this
//! trait boundary belongs to the transport implementation.

use futures_core::future::BoxFuture;

use crate::{RawResponse, Request, Result};

/// Completion callback for [`TransportCall::enqueue`].
///
/// The transport invokes it with the raw outcome and drives the returned
/// future to completion on its own dispatch task; response parsing happens
/// inside that future.
pub type TransportCallback = Box<dyn FnOnce(Result<RawResponse>) -> BoxFuture<'static, ()> + Send>;

/// Creates transport calls for built requests.
pub trait Transport: Send + Sync + 'static {
    /// Create a call for the request. The request is consumed; the returned
    /// call is driven at most once by the framework.
    fn new_call(&self, request: Request) -> std::sync::Arc<dyn TransportCall>;
}

/// A single in-flight (or not-yet-started) transport exchange.
pub trait TransportCall: Send + Sync {
    /// Send the request and resolve to the raw response.
    fn execute(self: std::sync::Arc<Self>) -> BoxFuture<'static, Result<RawResponse>>;

    /// Send the request and deliver the outcome through `callback` on the
    /// transport's own scheduling task. Never blocks the caller.
    fn enqueue(self: std::sync::Arc<Self>, callback: TransportCallback);

    /// Signal cooperative cancellation. Idempotent; the transport decides
    /// how quickly it takes effect.
    fn cancel(&self);

    /// Whether cancellation has been signaled.
    fn is_canceled(&self) -> bool;
}
