//! Endpoint descriptors and request materialization.
//!
//! An [`Endpoint`] is the explicit, build-once record of a declared remote
//! method: HTTP method, path template, and ordered parameter bindings.
//! Binding an endpoint resolves one converter per parameter and produces a
//! [`RequestFactory`]; each invocation then pairs the factory with that
//! call's [`Args`] to materialize an immutable [`Request`].
//!
//! Descriptor mistakes (a placeholder without a parameter, two body
//! parameters) surface when the descriptor is built or bound — never on
//! first use.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::convert::{Registry, RequestConverter, StringConverter, Target};
use crate::path_template::PathTemplate;
use crate::{EncodedBody, Error, Request, Result};

// ============================================================================
// Descriptor
// ============================================================================

/// Where a parameter is placed in the HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLocation {
    /// Substituted into a `{name}` path placeholder.
    Path,
    /// Appended as a single query parameter.
    Query,
    /// A bag of key/value pairs appended to the query in iteration order.
    QueryMap,
    /// Sent as a request header.
    Header,
    /// Encoded as the request body.
    Body,
}

impl std::fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Query => write!(f, "query"),
            Self::QueryMap => write!(f, "query map"),
            Self::Header => write!(f, "header"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// One declared parameter of an endpoint.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    location: ParamLocation,
    /// Absent only for query maps, whose pairs arrive pre-rendered.
    target: Option<Target>,
}

impl ParamSpec {
    /// Parameter name as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the parameter goes.
    #[must_use]
    pub const fn location(&self) -> ParamLocation {
        self.location
    }
}

/// The explicit descriptor of one remote endpoint, built once at startup.
#[derive(Debug, Clone)]
pub struct Endpoint {
    method: http::Method,
    path: PathTemplate,
    params: Vec<ParamSpec>,
    headers: Vec<(String, String)>,
}

impl Endpoint {
    /// Creates a new [`EndpointBuilder`].
    #[must_use]
    pub fn builder(method: http::Method, path: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder {
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &http::Method {
        &self.method
    }

    /// The path template.
    #[must_use]
    pub const fn path(&self) -> &PathTemplate {
        &self.path
    }

    /// Declared parameters, in call-argument order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

/// Builder for [`Endpoint`] descriptors.
#[derive(Debug)]
pub struct EndpointBuilder {
    method: http::Method,
    path: String,
    params: Vec<ParamSpec>,
    headers: Vec<(String, String)>,
}

impl EndpointBuilder {
    fn param(mut self, name: impl Into<String>, location: ParamLocation, target: Option<Target>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            location,
            target,
        });
        self
    }

    /// Declares a path parameter rendered with its `ToString`.
    #[must_use]
    pub fn path_param<T: ToString + Send + 'static>(self, name: impl Into<String>) -> Self {
        self.param(name, ParamLocation::Path, Some(Target::scalar::<T>()))
    }

    /// Declares a path parameter with an explicit target, for types whose
    /// rendering comes from a custom string-converter factory.
    #[must_use]
    pub fn path_param_target(self, name: impl Into<String>, target: Target) -> Self {
        self.param(name, ParamLocation::Path, Some(target))
    }

    /// Declares a query parameter rendered with its `ToString`.
    #[must_use]
    pub fn query_param<T: ToString + Send + 'static>(self, name: impl Into<String>) -> Self {
        self.param(name, ParamLocation::Query, Some(Target::scalar::<T>()))
    }

    /// Declares a query parameter with an explicit target.
    #[must_use]
    pub fn query_param_target(self, name: impl Into<String>, target: Target) -> Self {
        self.param(name, ParamLocation::Query, Some(target))
    }

    /// Declares a query-map parameter: the argument supplies ordered
    /// key/value pairs appended to the query string.
    #[must_use]
    pub fn query_map(self, name: impl Into<String>) -> Self {
        self.param(name, ParamLocation::QueryMap, None)
    }

    /// Declares a header parameter rendered with its `ToString`.
    #[must_use]
    pub fn header_param<T: ToString + Send + 'static>(self, name: impl Into<String>) -> Self {
        self.param(name, ParamLocation::Header, Some(Target::scalar::<T>()))
    }

    /// Declares the request-body parameter.
    #[must_use]
    pub fn body(self, target: Target) -> Self {
        self.param("body", ParamLocation::Body, Some(target))
    }

    /// Adds a header sent with every invocation.
    #[must_use]
    pub fn static_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Validates and builds the descriptor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the path template is malformed, a
    /// placeholder has no path parameter (or vice versa), or more than one
    /// body parameter is declared.
    pub fn build(self) -> Result<Endpoint> {
        let path = PathTemplate::parse(self.path)?;

        let mut declared: Vec<&str> = Vec::new();
        for spec in &self.params {
            if spec.location == ParamLocation::Path {
                if declared.contains(&spec.name.as_str()) {
                    return Err(Error::configuration(format!(
                        "duplicate path parameter `{}`",
                        spec.name
                    )));
                }
                declared.push(&spec.name);
            }
        }
        for placeholder in path.placeholders() {
            if !declared.contains(&placeholder.as_str()) {
                return Err(Error::configuration(format!(
                    "path placeholder `{{{placeholder}}}` has no declared parameter"
                )));
            }
        }
        for name in &declared {
            if !path.placeholders().iter().any(|p| p == name) {
                return Err(Error::configuration(format!(
                    "path parameter `{name}` does not appear in template `{path}`"
                )));
            }
        }

        let bodies = self
            .params
            .iter()
            .filter(|spec| spec.location == ParamLocation::Body)
            .count();
        if bodies > 1 {
            return Err(Error::configuration(
                "an endpoint can declare at most one body parameter",
            ));
        }

        Ok(Endpoint {
            method: self.method,
            path,
            params: self.params,
            headers: self.headers,
        })
    }
}

// ============================================================================
// Invocation arguments
// ============================================================================

/// Call-site arguments for one invocation, in declared parameter order.
#[derive(Default)]
pub struct Args {
    values: Vec<ArgValue>,
}

enum ArgValue {
    Scalar(Box<dyn Any + Send>),
    Pairs(Vec<(String, String)>),
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args").field("len", &self.values.len()).finish()
    }
}

impl Args {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scalar/body argument.
    #[must_use]
    pub fn scalar<T: Send + 'static>(mut self, value: T) -> Self {
        self.values.push(ArgValue::Scalar(Box::new(value)));
        self
    }

    /// Appends a query-map argument: ordered key/value pairs.
    #[must_use]
    pub fn pairs<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.push(ArgValue::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Request factory
// ============================================================================

enum ParamCodec {
    Path {
        name: String,
        encode: Arc<dyn StringConverter>,
    },
    Query {
        name: String,
        encode: Arc<dyn StringConverter>,
    },
    QueryMap {
        name: String,
    },
    Header {
        name: String,
        encode: Arc<dyn StringConverter>,
    },
    Body {
        name: String,
        encode: Arc<dyn RequestConverter>,
    },
}

impl ParamCodec {
    fn name(&self) -> &str {
        match self {
            Self::Path { name, .. }
            | Self::Query { name, .. }
            | Self::QueryMap { name }
            | Self::Header { name, .. }
            | Self::Body { name, .. } => name,
        }
    }
}

/// Materializes [`Request`]s for one bound endpoint.
///
/// Holds the descriptor plus the converters resolved for each parameter at
/// binding time; `create` only pairs them with one invocation's arguments.
pub struct RequestFactory {
    method: http::Method,
    template: PathTemplate,
    base_url: Url,
    headers: Vec<(String, String)>,
    codecs: Vec<ParamCodec>,
}

impl std::fmt::Debug for RequestFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestFactory")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("base_url", &self.base_url.as_str())
            .field("params", &self.codecs.len())
            .finish()
    }
}

impl RequestFactory {
    /// Resolves one converter per declared parameter.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any parameter has no matching
    /// converter factory.
    pub fn bind(endpoint: Endpoint, base_url: Url, registry: &Registry) -> Result<Self> {
        let Endpoint {
            method,
            path,
            params,
            headers,
        } = endpoint;

        let mut codecs = Vec::with_capacity(params.len());
        for spec in params {
            let missing_target = {
                let location = spec.location;
                let name = spec.name.clone();
                move || Error::configuration(format!("{location} parameter `{name}` has no type target"))
            };
            let codec = match spec.location {
                ParamLocation::Path => ParamCodec::Path {
                    encode: registry.string_converter(&spec.target.ok_or_else(missing_target)?)?,
                    name: spec.name,
                },
                ParamLocation::Query => ParamCodec::Query {
                    encode: registry.string_converter(&spec.target.ok_or_else(missing_target)?)?,
                    name: spec.name,
                },
                ParamLocation::QueryMap => ParamCodec::QueryMap { name: spec.name },
                ParamLocation::Header => ParamCodec::Header {
                    encode: registry.string_converter(&spec.target.ok_or_else(missing_target)?)?,
                    name: spec.name,
                },
                ParamLocation::Body => ParamCodec::Body {
                    encode: registry.request_converter(&spec.target.ok_or_else(missing_target)?)?,
                    name: spec.name,
                },
            };
            codecs.push(codec);
        }

        Ok(Self {
            method,
            template: path,
            base_url,
            headers,
            codecs,
        })
    }

    /// Builds the request for one invocation's arguments.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request error on argument arity or kind mismatch,
    /// or the converter's error if an argument cannot be encoded.
    pub fn create(&self, args: Args) -> Result<Request> {
        if args.values.len() != self.codecs.len() {
            return Err(Error::invalid_request(format!(
                "expected {} argument(s), got {}",
                self.codecs.len(),
                args.values.len()
            )));
        }

        let mut path_values = HashMap::new();
        let mut query_pairs: Vec<(String, String)> = Vec::new();
        let mut headers: Vec<(String, String)> = self.headers.clone();
        let mut body: Option<EncodedBody> = None;

        for (codec, value) in self.codecs.iter().zip(args.values) {
            match (codec, value) {
                (ParamCodec::Path { name, encode }, ArgValue::Scalar(value)) => {
                    path_values.insert(name.clone(), encode.convert(value.as_ref())?);
                }
                (ParamCodec::Query { name, encode }, ArgValue::Scalar(value)) => {
                    query_pairs.push((name.clone(), encode.convert(value.as_ref())?));
                }
                (ParamCodec::QueryMap { .. }, ArgValue::Pairs(pairs)) => {
                    query_pairs.extend(pairs);
                }
                (ParamCodec::Header { name, encode }, ArgValue::Scalar(value)) => {
                    headers.push((name.clone(), encode.convert(value.as_ref())?));
                }
                (ParamCodec::Body { encode, .. }, ArgValue::Scalar(value)) => {
                    body = Some(encode.convert(value)?);
                }
                (codec, ArgValue::Scalar(_)) => {
                    return Err(Error::invalid_request(format!(
                        "parameter `{}` expects key/value pairs, got a scalar",
                        codec.name()
                    )));
                }
                (codec, ArgValue::Pairs(_)) => {
                    return Err(Error::invalid_request(format!(
                        "parameter `{}` expects a scalar, got key/value pairs",
                        codec.name()
                    )));
                }
            }
        }

        let rendered = self.template.render(&path_values)?;
        let url = self.base_url.join(&rendered)?;

        let mut builder = Request::builder(self.method.clone(), url).query_pairs(query_pairs);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(encoded) = body {
            let (content_type, bytes) = encoded.into_parts();
            builder = builder
                .header_if_absent("Content-Type", content_type.as_str())
                .body(bytes);
        }
        Ok(builder.build())
    }
}
