//! Single-use call execution.
//!
//! A [`Call`] wraps a not-yet-built request and drives exactly one exchange
//! through the transport, either awaited in place ([`Call::execute`]) or
//! delivered through a callback on the transport's dispatch task
//! ([`Call::enqueue`]). The start transition is a single compare-exchange,
//! so concurrent starts can never send two requests; cancellation is an
//! orthogonal flag that stays observable forever once set.

use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::convert::ResponseConverter;
use crate::transport::{Transport, TransportCall};
use crate::{Error, RawResponse, Request, Response, Result};

/// Deferred request build: the descriptor builder's output captured together
/// with one invocation's arguments.
pub type RequestProvider = Box<dyn FnOnce() -> Result<Request> + Send>;

const CREATED: u8 = 0;
const STARTED: u8 = 1;
const FINISHED: u8 = 2;

/// One invocation of a bound endpoint.
///
/// Single-use: whichever of `execute`/`enqueue` wins the start transition
/// owns the exchange, and every later start attempt fails with
/// [`Error::AlreadyExecuted`] instead of re-sending.
pub struct Call<T> {
    state: Arc<CallState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("executed", &(self.state.phase.load(Ordering::Acquire) != CREATED))
            .field("canceled", &self.state.canceled.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

struct CallState {
    transport: Arc<dyn Transport>,
    converter: Arc<dyn ResponseConverter>,
    provider: Mutex<Option<RequestProvider>>,
    raw_call: Mutex<Option<Arc<dyn TransportCall>>>,
    phase: AtomicU8,
    canceled: AtomicBool,
}

impl CallState {
    /// Win the start transition, build the request, and create the transport
    /// call. Exactly one caller gets past the compare-exchange.
    fn begin(&self) -> Result<Arc<dyn TransportCall>> {
        self.phase
            .compare_exchange(CREATED, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyExecuted)?;

        let provider = self
            .provider
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::AlreadyExecuted)?;
        let request = match provider() {
            Ok(request) => request,
            Err(err) => {
                self.finish();
                return Err(err);
            }
        };

        let raw_call = self.transport.new_call(request);
        *self
            .raw_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&raw_call));
        // A cancel that raced the start still reaches the transport.
        if self.canceled.load(Ordering::Acquire) {
            raw_call.cancel();
        }
        Ok(raw_call)
    }

    fn finish(&self) {
        self.phase.store(FINISHED, Ordering::Release);
    }
}

impl<T: Send + 'static> Call<T> {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        converter: Arc<dyn ResponseConverter>,
        provider: RequestProvider,
    ) -> Self {
        Self {
            state: Arc::new(CallState {
                transport,
                converter,
                provider: Mutex::new(Some(provider)),
                raw_call: Mutex::new(None),
                phase: AtomicU8::new(CREATED),
                canceled: AtomicBool::new(false),
            }),
            _marker: PhantomData,
        }
    }

    /// Drive the call to completion, awaiting the full round trip.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::AlreadyExecuted`] on a second start, with the
    /// request-build error if the descriptor rejects the arguments, with
    /// [`Error::Canceled`] if canceled, or with the transport/conversion
    /// failure.
    pub async fn execute(&self) -> Result<Response<T>> {
        let raw_call = self.state.begin()?;
        if self.state.canceled.load(Ordering::Acquire) {
            self.state.finish();
            return Err(Error::Canceled);
        }

        let outcome = raw_call.execute().await;
        self.state.finish();
        let parsed = parse_response(outcome?, self.state.converter.as_ref()).await?;
        downcast_body(parsed)
    }

    /// Start the call and deliver the outcome through `callback`, invoked
    /// exactly once on the transport's dispatch task.
    ///
    /// The start transition happens synchronously, so a racing second start
    /// observes [`Error::AlreadyExecuted`] immediately. A request-build
    /// failure is delivered to the callback rather than dropped.
    ///
    /// # Errors
    ///
    /// Fails synchronously with [`Error::AlreadyExecuted`] if this call was
    /// already started; that usage error is the caller's own bug and is not
    /// routed through the completion callback.
    pub fn enqueue<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Response<T>>) + Send + 'static,
    {
        let raw_call = match self.state.begin() {
            Ok(raw_call) => raw_call,
            Err(Error::AlreadyExecuted) => return Err(Error::AlreadyExecuted),
            Err(build_error) => {
                deliver(callback, Err(build_error));
                return Ok(());
            }
        };

        let state = Arc::clone(&self.state);
        raw_call.enqueue(Box::new(move |outcome| {
            Box::pin(async move {
                let result = match outcome {
                    Ok(raw) => match parse_response(raw, state.converter.as_ref()).await {
                        Ok(parsed) => downcast_body(parsed),
                        Err(err) => Err(err),
                    },
                    Err(err) => Err(err),
                };
                state.finish();
                deliver(callback, result);
            })
        }));
        Ok(())
    }

    /// Signal cancellation. Idempotent; forwarded to the in-flight transport
    /// call when one exists. A call that already completed is unaffected but
    /// still reports the cancellation through [`Call::is_canceled`].
    pub fn cancel(&self) {
        self.state.canceled.store(true, Ordering::Release);
        let raw_call = self
            .state
            .raw_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(raw_call) = raw_call {
            raw_call.cancel();
        }
    }

    /// Whether a start transition has happened.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.state.phase.load(Ordering::Acquire) != CREATED
    }

    /// Whether cancellation was signaled, here or on the transport call.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        if self.state.canceled.load(Ordering::Acquire) {
            return true;
        }
        self.state
            .raw_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|raw_call| raw_call.is_canceled())
    }
}

/// Invoke a completion callback, containing panics.
///
/// The callback is external code; a panic inside it is reported and stops
/// there instead of corrupting the dispatch task. Process-fatal faults are
/// not catchable and propagate on their own.
fn deliver<T>(callback: impl FnOnce(Result<Response<T>>), result: Result<Response<T>>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || callback(result))) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(panic = %message, "call completion callback panicked");
    }
}

/// Turn a raw transport response into an envelope.
///
/// The body is detached from the metadata first, so the metadata outlives
/// it. Non-2xx bodies are buffered and never shown to the success converter;
/// 204/205 mean no content by contract, whatever is on the wire.
pub(crate) async fn parse_response(
    raw: RawResponse,
    converter: &dyn ResponseConverter,
) -> Result<Response<Box<dyn Any + Send>>> {
    let (meta, body) = raw.into_parts();

    if !meta.is_success() {
        let payload = body.buffer().await?;
        return Ok(Response::error(payload, meta));
    }

    if meta.status() == 204 || meta.status() == 205 {
        body.close();
        return Ok(Response::success(None, meta));
    }

    let (body, fault) = body.observe();
    match converter.convert(body).await {
        Ok(value) => Ok(Response::success(value, meta)),
        // A recorded fault means the network died mid-read; report that
        // rather than the converter's complaint about a truncated payload.
        Err(err) => Err(fault.take().unwrap_or(err)),
    }
}

fn downcast_body<T: Send + 'static>(
    response: Response<Box<dyn Any + Send>>,
) -> Result<Response<T>> {
    response.try_map_body(|value| {
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::conversion("converter produced a value of an unexpected type"))
    })
}
