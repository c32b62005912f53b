//! Declarative HTTP call framework for Rust.
//!
//! Describe remote endpoints once as explicit descriptors, bind them into
//! reusable service methods, and drive each invocation as a single-use call
//! with a success/error envelope result.
//!
//! # Example
//!
//! ```ignore
//! use grapple::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct Contributor {
//!     login: String,
//!     contributions: u32,
//! }
//!
//! let framework = Grapple::builder()
//!     .base_url("https://api.github.com")
//!     .converter_factory(JsonConverterFactory::new())
//!     .build()?;
//!
//! let contributors = framework.bind_json::<Vec<Contributor>>(
//!     Endpoint::builder(Method::GET, "/repos/{owner}/{repo}/contributors")
//!         .path_param::<String>("owner")
//!         .path_param::<String>("repo")
//!         .build()?,
//!     ReturnShape::Call,
//! )?;
//!
//! let call = contributors
//!     .invoke(Args::new().scalar("square".to_string()).scalar("retrofit".to_string()))
//!     .into_call()
//!     .unwrap();
//! let response = call.execute().await?;
//! ```

mod builder;
mod client;
mod config;
mod json;
pub mod middleware;
pub mod prelude;

// Re-export framework types
pub use builder::{Grapple, GrappleBuilder};
pub use client::{BoxedService, HyperTransport, HyperTransportBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use json::JsonConverterFactory;

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use grapple_core::{
    Adapted, Args, BodyFuture, BuiltInConverters, Call, CallAdapterFactory, ContentType,
    ConverterFactory, EncodedBody, Endpoint, EndpointBuilder, Error, ParamLocation, PathTemplate,
    RawBody, RawResponse, Registry, RegistryBuilder, Request, RequestBuilder, RequestConverter,
    RequestFactory, Response, ResponseConverter, ResponseFuture, ResponseMeta, Result,
    ReturnShape, ReturnTarget, ServiceMethod, StringConverter, Target, Transport, TransportCall,
    TransportCallback, from_json, to_form, to_json,
};

// Re-export http types for methods, status codes and headers
pub use grapple_core::{Method, StatusCode, header};
