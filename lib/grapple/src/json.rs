//! JSON converter factory.
//!
//! Serialization formats are pluggable: the core only carries the serde
//! helpers, and this factory turns the JSON hooks declared on endpoint
//! targets into converters. Register it first to make JSON the default
//! codec for declared types:
//!
//! ```ignore
//! let framework = Grapple::builder()
//!     .base_url("https://api.github.com")
//!     .converter_factory(JsonConverterFactory::new())
//!     .build()?;
//! ```

use std::any::Any;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use grapple_core::{
    ConverterFactory, DecodeHook, EncodeHook, EncodedBody, RawBody, RequestConverter,
    ResponseConverter, Result, Target,
};

/// Converter factory for JSON request and response bodies.
///
/// Matches any target that declared JSON hooks
/// ([`Target::json_response`]/[`Target::json_request`]) and defers on
/// everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverterFactory;

impl JsonConverterFactory {
    /// Creates the factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ConverterFactory for JsonConverterFactory {
    fn response_converter(&self, target: &Target) -> Option<Arc<dyn ResponseConverter>> {
        target
            .decode_hook()
            .map(|decode| Arc::new(JsonResponseConverter { decode }) as Arc<dyn ResponseConverter>)
    }

    fn request_converter(&self, target: &Target) -> Option<Arc<dyn RequestConverter>> {
        target
            .encode_hook()
            .map(|encode| Arc::new(JsonRequestConverter { encode }) as Arc<dyn RequestConverter>)
    }
}

/// Buffers the body and decodes it through the target's hook.
struct JsonResponseConverter {
    decode: DecodeHook,
}

impl ResponseConverter for JsonResponseConverter {
    fn convert(&self, body: RawBody) -> BoxFuture<'static, Result<Option<Box<dyn Any + Send>>>> {
        let decode = self.decode;
        Box::pin(async move {
            let bytes = body.buffer().await?;
            decode(&bytes).map(Some)
        })
    }
}

/// Encodes the body argument through the target's hook.
struct JsonRequestConverter {
    encode: EncodeHook,
}

impl RequestConverter for JsonRequestConverter {
    fn convert(&self, value: Box<dyn Any + Send>) -> Result<EncodedBody> {
        (self.encode)(value.as_ref())
    }
}
