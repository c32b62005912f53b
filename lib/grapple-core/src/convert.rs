//! Converter resolution.
//!
//! Endpoints describe their types as [`Target`]s; converter factories are
//! consulted in registration order and the first match wins, so precedence
//! is expressed by registering the more specific factory first. Built-in
//! fallbacks are always appended last by [`RegistryBuilder::build`].
//!
//! Converters cross an erased seam: response converters yield
//! `Box<dyn Any + Send>` values that the typed call surface downcasts. The
//! hooks carried by a [`Target`] are captured in statically-typed binding
//! code, which is how a dynamic factory can decode into a type it has never
//! seen.

use std::any::{Any, TypeId};
use std::sync::Arc;

use bytes::Bytes;
use futures_core::future::BoxFuture;

use crate::adapter::{CallAdapterFactory, DefaultCallAdapterFactory, ReturnShape, ReturnTarget};
use crate::{ContentType, EncodedBody, Error, RawBody, Result};

// ============================================================================
// Targets
// ============================================================================

/// Decodes wire bytes into an erased value of the target type.
pub type DecodeHook = fn(&[u8]) -> Result<Box<dyn Any + Send>>;

/// Encodes an erased value of the target type into a request body.
pub type EncodeHook = fn(&dyn Any) -> Result<EncodedBody>;

/// Renders an erased value of the target type as a string.
pub type DisplayHook = fn(&dyn Any) -> Option<String>;

/// Describes a declared type to converter and adapter factories.
///
/// Carries the type identity plus optional capability hooks captured where
/// the concrete type was still known. Factories are free to match on the
/// identity alone, on a hook, or on both.
#[derive(Debug, Clone, Copy)]
pub struct Target {
    type_id: TypeId,
    type_name: &'static str,
    decode: Option<DecodeHook>,
    encode: Option<EncodeHook>,
    display: Option<DisplayHook>,
}

impl Target {
    /// Describes a type by identity only.
    #[must_use]
    pub fn of<T: Send + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            decode: None,
            encode: None,
            display: None,
        }
    }

    /// Describes a response type decodable from JSON.
    #[must_use]
    pub fn json_response<T: serde::de::DeserializeOwned + Send + 'static>() -> Self {
        Self {
            decode: Some(decode_json::<T>),
            ..Self::of::<T>()
        }
    }

    /// Describes a request body type encodable as JSON.
    #[must_use]
    pub fn json_request<T: serde::Serialize + Send + 'static>() -> Self {
        Self {
            encode: Some(encode_json::<T>),
            ..Self::of::<T>()
        }
    }

    /// Describes a scalar parameter rendered with its `ToString`.
    #[must_use]
    pub fn scalar<T: ToString + Send + 'static>() -> Self {
        Self {
            display: Some(display_value::<T>),
            ..Self::of::<T>()
        }
    }

    /// The target's type identity.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The target's type name, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the target is exactly `U`.
    #[must_use]
    pub fn is<U: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<U>()
    }

    /// The JSON decode hook, if the endpoint declared one.
    #[must_use]
    pub const fn decode_hook(&self) -> Option<DecodeHook> {
        self.decode
    }

    /// The JSON encode hook, if the endpoint declared one.
    #[must_use]
    pub const fn encode_hook(&self) -> Option<EncodeHook> {
        self.encode
    }

    /// The string-render hook, if the endpoint declared one.
    #[must_use]
    pub const fn display_hook(&self) -> Option<DisplayHook> {
        self.display
    }
}

fn decode_json<T: serde::de::DeserializeOwned + Send + 'static>(
    bytes: &[u8],
) -> Result<Box<dyn Any + Send>> {
    crate::from_json::<T>(bytes).map(|value| Box::new(value) as Box<dyn Any + Send>)
}

fn encode_json<T: serde::Serialize + Send + 'static>(value: &dyn Any) -> Result<EncodedBody> {
    let value = value
        .downcast_ref::<T>()
        .ok_or_else(|| Error::conversion("body argument does not match its declared type"))?;
    crate::to_json(value).map(|bytes| EncodedBody::new(ContentType::Json, bytes))
}

fn display_value<T: ToString + Send + 'static>(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<T>().map(ToString::to_string)
}

// ============================================================================
// Converter capabilities
// ============================================================================

/// Decodes a response body stream into a value of the bound type.
///
/// The converter owns the body: it must drain or drop (close) it, and the
/// framework will not close it again afterwards. Returning `Ok(None)` is the
/// explicit "no value" marker.
pub trait ResponseConverter: Send + Sync {
    /// Convert the body. The erased value is downcast by the typed caller.
    fn convert(&self, body: RawBody) -> BoxFuture<'static, Result<Option<Box<dyn Any + Send>>>>;
}

/// Encodes a request body argument into wire bytes.
pub trait RequestConverter: Send + Sync {
    /// Convert the erased argument into an encoded body.
    fn convert(&self, value: Box<dyn Any + Send>) -> Result<EncodedBody>;
}

/// Renders a path/query/header argument as a string.
pub trait StringConverter: Send + Sync {
    /// Convert the erased argument into its string form.
    fn convert(&self, value: &dyn Any) -> Result<String>;
}

/// A converter factory: each method may return `None` to defer to the next
/// registered factory.
pub trait ConverterFactory: Send + Sync {
    /// Offer a converter for response bodies of the target type.
    fn response_converter(&self, target: &Target) -> Option<Arc<dyn ResponseConverter>> {
        let _ = target;
        None
    }

    /// Offer a converter for request bodies of the target type.
    fn request_converter(&self, target: &Target) -> Option<Arc<dyn RequestConverter>> {
        let _ = target;
        None
    }

    /// Offer a string converter for parameters of the target type.
    fn string_converter(&self, target: &Target) -> Option<Arc<dyn StringConverter>> {
        let _ = target;
        None
    }
}

// ============================================================================
// Built-in fallbacks
// ============================================================================

/// Fallback converters, always registered last:
///
/// 1. raw pass-through for `Bytes` response targets (fully buffered so the
///    connection can be recycled);
/// 2. a `()` response converter that closes the body and yields no value;
/// 3. raw pass-through for `Bytes` request bodies;
/// 4. `ToString`-based rendering for scalar parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltInConverters;

impl ConverterFactory for BuiltInConverters {
    fn response_converter(&self, target: &Target) -> Option<Arc<dyn ResponseConverter>> {
        if target.is::<Bytes>() {
            return Some(Arc::new(BufferingConverter));
        }
        if target.is::<()>() {
            return Some(Arc::new(UnitConverter));
        }
        None
    }

    fn request_converter(&self, target: &Target) -> Option<Arc<dyn RequestConverter>> {
        if target.is::<Bytes>() {
            return Some(Arc::new(RawRequestConverter));
        }
        None
    }

    fn string_converter(&self, target: &Target) -> Option<Arc<dyn StringConverter>> {
        target
            .display_hook()
            .map(|hook| Arc::new(DisplayConverter { hook }) as Arc<dyn StringConverter>)
    }
}

/// Buffers the whole body into memory and hands the bytes back.
struct BufferingConverter;

impl ResponseConverter for BufferingConverter {
    fn convert(&self, body: RawBody) -> BoxFuture<'static, Result<Option<Box<dyn Any + Send>>>> {
        Box::pin(async move {
            let bytes = body.buffer().await?;
            Ok(Some(Box::new(bytes) as Box<dyn Any + Send>))
        })
    }
}

/// Closes the body unread and yields no value.
struct UnitConverter;

impl ResponseConverter for UnitConverter {
    fn convert(&self, body: RawBody) -> BoxFuture<'static, Result<Option<Box<dyn Any + Send>>>> {
        body.close();
        Box::pin(async move { Ok(None) })
    }
}

/// Passes an already-encoded `Bytes` argument through unchanged.
struct RawRequestConverter;

impl RequestConverter for RawRequestConverter {
    fn convert(&self, value: Box<dyn Any + Send>) -> Result<EncodedBody> {
        value
            .downcast::<Bytes>()
            .map(|bytes| EncodedBody::new(ContentType::OctetStream, *bytes))
            .map_err(|_| Error::conversion("raw body argument was not `Bytes`"))
    }
}

/// Renders a scalar through the target's `ToString` hook.
struct DisplayConverter {
    hook: DisplayHook,
}

impl StringConverter for DisplayConverter {
    fn convert(&self, value: &dyn Any) -> Result<String> {
        (self.hook)(value)
            .ok_or_else(|| Error::conversion("parameter value does not match its declared type"))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered converter and call-adapter factories.
///
/// Resolution walks factories strictly in registration order and takes the
/// first match; finding none is a binding-time configuration error, surfaced
/// when the service method is constructed rather than on first use.
pub struct Registry {
    converters: Vec<Arc<dyn ConverterFactory>>,
    adapters: Vec<Arc<dyn CallAdapterFactory>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("converter_factories", &self.converters.len())
            .field("adapter_factories", &self.adapters.len())
            .finish()
    }
}

impl Registry {
    /// Creates a new registry builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolve a response-body converter for the target type.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no factory matches.
    pub fn response_converter(&self, target: &Target) -> Result<Arc<dyn ResponseConverter>> {
        self.converters
            .iter()
            .find_map(|factory| factory.response_converter(target))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no converter factory can decode `{}` response bodies",
                    target.type_name()
                ))
            })
    }

    /// Resolve a request-body converter for the target type.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no factory matches.
    pub fn request_converter(&self, target: &Target) -> Result<Arc<dyn RequestConverter>> {
        self.converters
            .iter()
            .find_map(|factory| factory.request_converter(target))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no converter factory can encode `{}` request bodies",
                    target.type_name()
                ))
            })
    }

    /// Resolve a string converter for a parameter of the target type.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no factory matches.
    pub fn string_converter(&self, target: &Target) -> Result<Arc<dyn StringConverter>> {
        self.converters
            .iter()
            .find_map(|factory| factory.string_converter(target))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no converter factory can render `{}` parameters as strings",
                    target.type_name()
                ))
            })
    }

    /// Resolve the call-adapter shape for a declared return target.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no factory matches.
    pub fn call_adapter(&self, returns: &ReturnTarget) -> Result<ReturnShape> {
        self.adapters
            .iter()
            .find_map(|factory| factory.call_adapter(returns))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no call adapter factory matches the declared return shape for `{}`",
                    returns.inner().type_name()
                ))
            })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`Registry`].
///
/// User factories keep their registration order; built-ins go last.
#[derive(Default)]
pub struct RegistryBuilder {
    converters: Vec<Arc<dyn ConverterFactory>>,
    adapters: Vec<Arc<dyn CallAdapterFactory>>,
}

impl RegistryBuilder {
    /// Register a converter factory. Earlier registrations take precedence.
    #[must_use]
    pub fn converter_factory(mut self, factory: impl ConverterFactory + 'static) -> Self {
        self.converters.push(Arc::new(factory));
        self
    }

    /// Register a call-adapter factory. Earlier registrations take
    /// precedence.
    #[must_use]
    pub fn adapter_factory(mut self, factory: impl CallAdapterFactory + 'static) -> Self {
        self.adapters.push(Arc::new(factory));
        self
    }

    /// Build the registry, appending the built-in fallbacks.
    #[must_use]
    pub fn build(mut self) -> Registry {
        self.converters.push(Arc::new(BuiltInConverters));
        self.adapters.push(Arc::new(DefaultCallAdapterFactory));
        Registry {
            converters: self.converters,
            adapters: self.adapters,
        }
    }
}
