//! Service method binding.
//!
//! A [`ServiceMethod`] is the callable bound to one declared endpoint: all
//! converter/adapter resolution happens once here, so a misconfigured
//! endpoint fails when it is bound, not on its first call. Invocation only
//! packages the arguments into a lazy request build and hands a fresh
//! [`Call`] to the resolved adapter shape.

use std::marker::PhantomData;
use std::sync::Arc;

use url::Url;

use crate::adapter::{Adapted, ReturnShape, ReturnTarget, adapt};
use crate::call::{Call, RequestProvider};
use crate::convert::{Registry, ResponseConverter, Target};
use crate::endpoint::{Args, Endpoint, RequestFactory};
use crate::transport::Transport;
use crate::{Error, RawResponse, ResponseMeta, Result};

/// One bound endpoint: descriptor, resolved converters, transport, and the
/// adapter shape, reused across every invocation.
pub struct ServiceMethod<T> {
    factory: Arc<RequestFactory>,
    transport: Arc<dyn Transport>,
    converter: Arc<dyn ResponseConverter>,
    shape: ReturnShape,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for ServiceMethod<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMethod")
            .field("factory", &self.factory)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> ServiceMethod<T> {
    /// Binds an endpoint: rejects reserved response types, resolves the
    /// response converter, the adapter shape, and one converter per
    /// parameter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any unresolvable piece; nothing is
    /// deferred to call time.
    pub fn bind(
        endpoint: Endpoint,
        base_url: Url,
        transport: Arc<dyn Transport>,
        registry: &Registry,
        returns: ReturnTarget,
    ) -> Result<Self> {
        let inner = returns.inner();
        if inner.is::<RawResponse>() {
            return Err(Error::configuration(
                "`RawResponse` is not a valid response body type; declare `Bytes` to receive \
                 the raw payload",
            ));
        }
        if inner.is::<ResponseMeta>() {
            return Err(Error::configuration(
                "`ResponseMeta` cannot be bound on its own; metadata stays paired with the \
                 decoded body in the response envelope",
            ));
        }
        debug_assert!(
            inner.is::<T>(),
            "return target does not describe the bound type"
        );

        let converter = registry.response_converter(inner)?;
        let shape = registry.call_adapter(&returns)?;
        let factory = RequestFactory::bind(endpoint, base_url, registry)?;

        Ok(Self {
            factory: Arc::new(factory),
            transport,
            converter,
            shape,
            _marker: PhantomData,
        })
    }

    /// Invokes the method with one set of arguments.
    ///
    /// The request is built lazily inside the returned call, so argument
    /// errors surface when the call is driven — from `execute` as its error,
    /// from `enqueue` through the failure callback.
    #[must_use]
    pub fn invoke(&self, args: Args) -> Adapted<T> {
        let factory = Arc::clone(&self.factory);
        let provider: RequestProvider = Box::new(move || factory.create(args));
        let call = Call::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.converter),
            provider,
        );
        adapt(self.shape, call)
    }

    /// The adapter shape resolved at binding time.
    #[must_use]
    pub const fn shape(&self) -> ReturnShape {
        self.shape
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use bytes::Bytes;
    use futures_core::future::BoxFuture;

    use super::*;
    use crate::transport::{TransportCall, TransportCallback};
    use crate::{RawBody, Request};

    /// Transport that records the last request and answers with a canned
    /// response.
    struct RecordingTransport {
        status: u16,
        body: &'static [u8],
        seen: Arc<Mutex<Option<Request>>>,
    }

    impl RecordingTransport {
        fn new(status: u16, body: &'static [u8]) -> (Arc<Self>, Arc<Mutex<Option<Request>>>) {
            let seen = Arc::new(Mutex::new(None));
            let transport = Arc::new(Self {
                status,
                body,
                seen: Arc::clone(&seen),
            });
            (transport, seen)
        }
    }

    impl Transport for RecordingTransport {
        fn new_call(&self, request: Request) -> Arc<dyn TransportCall> {
            *self.seen.lock().expect("lock") = Some(request.clone());
            Arc::new(CannedCall {
                status: self.status,
                body: self.body,
                canceled: AtomicBool::new(false),
            })
        }
    }

    struct CannedCall {
        status: u16,
        body: &'static [u8],
        canceled: AtomicBool,
    }

    impl TransportCall for CannedCall {
        fn execute(self: Arc<Self>) -> BoxFuture<'static, Result<RawResponse>> {
            Box::pin(async move {
                Ok(RawResponse::new(
                    self.status,
                    HashMap::new(),
                    RawBody::from_bytes(Bytes::from_static(self.body)),
                ))
            })
        }

        fn enqueue(self: Arc<Self>, callback: TransportCallback) {
            tokio::spawn(async move {
                let outcome = self.execute().await;
                callback(outcome).await;
            });
        }

        fn cancel(&self) {
            self.canceled.store(true, Ordering::Release);
        }

        fn is_canceled(&self) -> bool {
            self.canceled.load(Ordering::Acquire)
        }
    }

    fn base_url() -> Url {
        Url::parse("https://api.example.com").expect("base url")
    }

    fn bytes_endpoint() -> Endpoint {
        Endpoint::builder(http::Method::GET, "/items/{id}")
            .path_param::<u32>("id")
            .build()
            .expect("endpoint")
    }

    #[test]
    fn bind_rejects_reserved_raw_types() {
        let (transport, _) = RecordingTransport::new(200, b"");

        let err = ServiceMethod::<RawResponse>::bind(
            bytes_endpoint(),
            base_url(),
            transport.clone(),
            &Registry::default(),
            ReturnTarget::new(ReturnShape::Response, Target::of::<RawResponse>()),
        )
        .expect_err("raw response is reserved");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Bytes"));

        let err = ServiceMethod::<ResponseMeta>::bind(
            bytes_endpoint(),
            base_url(),
            transport,
            &Registry::default(),
            ReturnTarget::new(ReturnShape::Response, Target::of::<ResponseMeta>()),
        )
        .expect_err("metadata alone is reserved");
        assert!(err.is_configuration());
    }

    #[test]
    fn bind_fails_fast_without_a_converter() {
        struct Unconvertible;
        let (transport, _) = RecordingTransport::new(200, b"");

        let err = ServiceMethod::<Unconvertible>::bind(
            bytes_endpoint(),
            base_url(),
            transport,
            &Registry::default(),
            ReturnTarget::new(ReturnShape::Response, Target::of::<Unconvertible>()),
        )
        .expect_err("no converter factory");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Unconvertible"));
    }

    #[tokio::test]
    async fn invoke_builds_the_request_and_parses_the_envelope() {
        let (transport, seen) = RecordingTransport::new(200, b"payload");
        let method = ServiceMethod::<Bytes>::bind(
            bytes_endpoint(),
            base_url(),
            transport,
            &Registry::default(),
            ReturnTarget::new(ReturnShape::Response, Target::of::<Bytes>()),
        )
        .expect("bind");

        let future = method
            .invoke(Args::new().scalar(7_u32))
            .into_response_future()
            .expect("response shape");
        let response = future.await.expect("response");

        assert_eq!(response.body().map(Bytes::as_ref), Some(&b"payload"[..]));
        let request = seen.lock().expect("lock").take().expect("request sent");
        assert_eq!(request.url().as_str(), "https://api.example.com/items/7");
        assert_eq!(request.method(), http::Method::GET);
    }

    #[tokio::test]
    async fn invoke_with_call_shape_hands_back_an_unstarted_call() {
        let (transport, seen) = RecordingTransport::new(200, b"late");
        let method = ServiceMethod::<Bytes>::bind(
            bytes_endpoint(),
            base_url(),
            transport,
            &Registry::default(),
            ReturnTarget::new(ReturnShape::Call, Target::of::<Bytes>()),
        )
        .expect("bind");
        assert_eq!(method.shape(), ReturnShape::Call);

        let call = method
            .invoke(Args::new().scalar(1_u32))
            .into_call()
            .expect("call shape");
        assert!(!call.is_executed());
        // Nothing sent until the caller drives the call.
        assert!(seen.lock().expect("lock").is_none());

        let response = call.execute().await.expect("response");
        assert!(response.is_successful());
        assert!(seen.lock().expect("lock").is_some());
    }

    #[tokio::test]
    async fn invoke_with_body_shape_unwraps_protocol_failures() {
        let (transport, _) = RecordingTransport::new(404, b"gone");
        let method = ServiceMethod::<Bytes>::bind(
            bytes_endpoint(),
            base_url(),
            transport,
            &Registry::default(),
            ReturnTarget::new(ReturnShape::Body, Target::of::<Bytes>()),
        )
        .expect("bind");

        let err = method
            .invoke(Args::new().scalar(1_u32))
            .into_body_future()
            .expect("body shape")
            .await
            .expect_err("http failure");
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body().map(Bytes::as_ref), Some(&b"gone"[..]));
    }

    #[tokio::test]
    async fn invoke_argument_errors_surface_when_driven() {
        let (transport, seen) = RecordingTransport::new(200, b"unused");
        let method = ServiceMethod::<Bytes>::bind(
            bytes_endpoint(),
            base_url(),
            transport,
            &Registry::default(),
            ReturnTarget::new(ReturnShape::Response, Target::of::<Bytes>()),
        )
        .expect("bind");

        // Wrong arity: the binding is fine, the invocation is not.
        let err = method
            .invoke(Args::new())
            .into_response_future()
            .expect("response shape")
            .await
            .expect_err("arity");
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(seen.lock().expect("lock").is_none());
    }
}
