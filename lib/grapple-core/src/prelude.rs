//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use grapple_core::prelude::*;
//! ```

pub use crate::{
    Adapted, Args, Call, ContentType, Endpoint, Error, Method, Registry, Request, RequestBuilder,
    Response, Result, ReturnShape, ReturnTarget, ServiceMethod, StatusCode, Target, Transport,
    from_json, header, to_form, to_json,
};
