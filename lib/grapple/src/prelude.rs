//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types, functions, and
//! factories for easy glob importing:
//!
//! ```ignore
//! use grapple::prelude::*;
//! ```

pub use crate::{
    Adapted, Args, Call, ClientConfig, Endpoint, Error, Grapple, HyperTransport,
    JsonConverterFactory, Method, Request, Response, Result, ReturnShape, ReturnTarget,
    ServiceMethod, StatusCode, Target, from_json, header, to_form, to_json,
};
pub use serde::{Deserialize, Serialize};
