//! Call adaptation: matching a call to the return shape an endpoint
//! declares.
//!
//! The open-ended adapter polymorphism of annotation-driven frameworks is
//! collapsed into a closed set of shapes: hand the call back, drive it to an
//! envelope, or drive it and unwrap the decoded body. Adapter factories
//! still resolve through the registry in registration order, so the shape an
//! endpoint gets remains a pluggable decision.

use std::any::Any;

use futures_core::future::BoxFuture;

use crate::call::Call;
use crate::convert::Target;
use crate::{Error, Response, Result};

/// Future resolving to a full response envelope.
pub type ResponseFuture<T> = BoxFuture<'static, Result<Response<T>>>;

/// Future resolving to a decoded body.
pub type BodyFuture<T> = BoxFuture<'static, Result<T>>;

/// The closed set of return shapes an endpoint can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    /// Hand the unstarted call back; the caller drives it.
    Call,
    /// Drive the call and yield the full envelope.
    Response,
    /// Drive the call and yield the decoded body; a non-2xx envelope becomes
    /// an [`Error::Http`].
    Body,
}

/// A declared return target: the shape plus the wrapped response type.
#[derive(Debug, Clone, Copy)]
pub struct ReturnTarget {
    shape: ReturnShape,
    inner: Target,
}

impl ReturnTarget {
    /// Creates a return target.
    #[must_use]
    pub const fn new(shape: ReturnShape, inner: Target) -> Self {
        Self { shape, inner }
    }

    /// The declared shape.
    #[must_use]
    pub const fn shape(&self) -> ReturnShape {
        self.shape
    }

    /// The wrapped response type.
    #[must_use]
    pub const fn inner(&self) -> &Target {
        &self.inner
    }
}

/// A call-adapter factory: return the shape to use for the declared return
/// target, or `None` to defer to the next registered factory.
pub trait CallAdapterFactory: Send + Sync {
    /// Offer an adapter shape for the declared return target.
    fn call_adapter(&self, returns: &ReturnTarget) -> Option<ReturnShape>;
}

/// Fallback adapter factory: honors whatever shape the endpoint declared.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCallAdapterFactory;

impl CallAdapterFactory for DefaultCallAdapterFactory {
    fn call_adapter(&self, returns: &ReturnTarget) -> Option<ReturnShape> {
        Some(returns.shape())
    }
}

/// The adapted result of invoking a bound service method.
pub enum Adapted<T> {
    /// The call itself, not yet started.
    Call(Call<T>),
    /// A future driving the call to its envelope.
    Response(ResponseFuture<T>),
    /// A future driving the call and unwrapping the decoded body.
    Body(BodyFuture<T>),
}

impl<T> std::fmt::Debug for Adapted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Self::Call(_) => "Call",
            Self::Response(_) => "Response",
            Self::Body(_) => "Body",
        };
        f.debug_tuple("Adapted").field(&shape).finish()
    }
}

impl<T> Adapted<T> {
    /// The unstarted call, when the bound shape is [`ReturnShape::Call`].
    #[must_use]
    pub fn into_call(self) -> Option<Call<T>> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// The envelope future, when the bound shape is
    /// [`ReturnShape::Response`].
    #[must_use]
    pub fn into_response_future(self) -> Option<ResponseFuture<T>> {
        match self {
            Self::Response(future) => Some(future),
            _ => None,
        }
    }

    /// The body future, when the bound shape is [`ReturnShape::Body`].
    #[must_use]
    pub fn into_body_future(self) -> Option<BodyFuture<T>> {
        match self {
            Self::Body(future) => Some(future),
            _ => None,
        }
    }
}

/// Wraps a call into the resolved shape.
pub(crate) fn adapt<T: Send + 'static>(shape: ReturnShape, call: Call<T>) -> Adapted<T> {
    match shape {
        ReturnShape::Call => Adapted::Call(call),
        ReturnShape::Response => Adapted::Response(Box::pin(async move { call.execute().await })),
        ReturnShape::Body => Adapted::Body(Box::pin(async move {
            let response = call.execute().await?;
            unwrap_body(response)
        })),
    }
}

/// Turns an envelope into a plain body, mapping protocol failures to
/// [`Error::Http`]. An absent body only satisfies endpoints declaring `()`.
fn unwrap_body<T: Send + 'static>(response: Response<T>) -> Result<T> {
    if !response.is_successful() {
        let status = response.status();
        let message = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("HTTP error")
            .to_string();
        return Err(Error::Http {
            status,
            message,
            body: response.into_error_body(),
        });
    }
    match response.into_body() {
        Some(value) => Ok(value),
        None => (Box::new(()) as Box<dyn Any + Send>)
            .downcast::<T>()
            .map(|unit| *unit)
            .map_err(|_| Error::conversion("response carried no body for an endpoint declaring one")),
    }
}
