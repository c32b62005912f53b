//! Top-level framework builder.
//!
//! A [`Grapple`] instance pairs a base URL, a transport, and a converter
//! registry; endpoints are bound against it once at startup and the
//! resulting [`ServiceMethod`]s are reused for every invocation.
//!
//! # Example
//!
//! ```ignore
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
//! ```

use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use grapple_core::{
    CallAdapterFactory, ConverterFactory, Endpoint, Error, Registry, RegistryBuilder, Result,
    ReturnShape, ReturnTarget, ServiceMethod, Target, Transport,
};

use crate::client::HyperTransport;

/// The configured framework: base URL, transport, and registry.
pub struct Grapple {
    base_url: Url,
    transport: Arc<dyn Transport>,
    registry: Registry,
}

impl std::fmt::Debug for Grapple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grapple")
            .field("base_url", &self.base_url.as_str())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Grapple {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> GrappleBuilder {
        GrappleBuilder::default()
    }

    /// The base URL endpoints resolve against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The converter/adapter registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Binds an endpoint with an explicit return target.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any converter, adapter, or
    /// descriptor piece cannot be resolved.
    pub fn bind<T: Send + 'static>(
        &self,
        endpoint: Endpoint,
        returns: ReturnTarget,
    ) -> Result<ServiceMethod<T>> {
        ServiceMethod::bind(
            endpoint,
            self.base_url.clone(),
            Arc::clone(&self.transport),
            &self.registry,
            returns,
        )
    }

    /// Binds an endpoint whose response body decodes from JSON.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if binding fails — including when no
    /// JSON-capable converter factory is registered.
    pub fn bind_json<T: serde::de::DeserializeOwned + Send + 'static>(
        &self,
        endpoint: Endpoint,
        shape: ReturnShape,
    ) -> Result<ServiceMethod<T>> {
        self.bind(endpoint, ReturnTarget::new(shape, Target::json_response::<T>()))
    }

    /// Binds an endpoint that yields the raw (buffered) response bytes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if binding fails.
    pub fn bind_bytes(
        &self,
        endpoint: Endpoint,
        shape: ReturnShape,
    ) -> Result<ServiceMethod<Bytes>> {
        self.bind(endpoint, ReturnTarget::new(shape, Target::of::<Bytes>()))
    }

    /// Binds an endpoint with no meaningful response body.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if binding fails.
    pub fn bind_unit(&self, endpoint: Endpoint, shape: ReturnShape) -> Result<ServiceMethod<()>> {
        self.bind(endpoint, ReturnTarget::new(shape, Target::of::<()>()))
    }
}

/// Builder for [`Grapple`].
#[derive(Default)]
pub struct GrappleBuilder {
    base_url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    registry: RegistryBuilder,
}

impl std::fmt::Debug for GrappleBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrappleBuilder")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GrappleBuilder {
    /// Sets the base URL (required).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the transport. Defaults to [`HyperTransport::new`].
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Registers a converter factory. Earlier registrations take precedence
    /// over later ones and over the built-ins.
    #[must_use]
    pub fn converter_factory(mut self, factory: impl ConverterFactory + 'static) -> Self {
        self.registry = self.registry.converter_factory(factory);
        self
    }

    /// Registers a call-adapter factory.
    #[must_use]
    pub fn adapter_factory(mut self, factory: impl CallAdapterFactory + 'static) -> Self {
        self.registry = self.registry.adapter_factory(factory);
        self
    }

    /// Builds the framework instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or does not parse.
    pub fn build(self) -> Result<Grapple> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::configuration("a base URL is required"))?;
        let base_url = Url::parse(&base_url)?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new()));

        Ok(Grapple {
            base_url,
            transport,
            registry: self.registry.build(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_a_base_url() {
        let err = Grapple::builder().build().expect_err("missing base url");
        assert!(err.is_configuration());
    }

    #[test]
    fn build_rejects_an_invalid_base_url() {
        let err = Grapple::builder()
            .base_url("not a url")
            .build()
            .expect_err("invalid base url");
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn build_with_defaults() {
        let framework = Grapple::builder()
            .base_url("https://api.github.com")
            .build()
            .expect("framework");
        assert_eq!(framework.base_url().as_str(), "https://api.github.com/");
    }
}
