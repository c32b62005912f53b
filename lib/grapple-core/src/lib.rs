//! Core call pipeline for the grapple declarative HTTP framework.
//!
//! This crate provides the machinery that turns one invocation of a declared
//! endpoint into a request, an exchange, and a typed result:
//! - [`Endpoint`] and [`RequestFactory`] - explicit endpoint descriptors
//! - [`Registry`] and [`ConverterFactory`] - ordered converter resolution
//! - [`Call`] - the single-use execution unit with cancellation
//! - [`Response`] - the success/error envelope
//! - [`Transport`] and [`TransportCall`] - the seam to actual I/O
//! - [`ServiceMethod`] - the bound, reusable callable per endpoint
//!
//! It performs no socket I/O itself; a transport implementation (such as the
//! hyper-based one in the `grapple` crate) plugs in behind [`Transport`].

mod adapter;
mod body;
mod call;
mod convert;
mod endpoint;
mod error;
mod path_template;
pub mod prelude;
mod request;
mod response;
mod service;
mod transport;

pub use adapter::{
    Adapted, BodyFuture, CallAdapterFactory, DefaultCallAdapterFactory, ResponseFuture,
    ReturnShape, ReturnTarget,
};
pub use body::{ContentType, EncodedBody, from_json, to_form, to_json};
pub use call::{Call, RequestProvider};
pub use convert::{
    BuiltInConverters, ConverterFactory, DecodeHook, DisplayHook, EncodeHook, Registry,
    RegistryBuilder, RequestConverter, ResponseConverter, StringConverter, Target,
};
pub use endpoint::{Args, Endpoint, EndpointBuilder, ParamLocation, ParamSpec, RequestFactory};
pub use error::{Error, Result};
pub use path_template::PathTemplate;
pub use request::{Request, RequestBuilder};
pub use response::{ByteStream, FaultSlot, RawBody, RawResponse, Response, ResponseMeta};
pub use service::ServiceMethod;
pub use transport::{Transport, TransportCall, TransportCallback};

// Re-export http crate types for methods, status codes and headers
pub use http::{Method, StatusCode, header};
