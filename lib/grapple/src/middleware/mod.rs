//! Tower middleware layers for the grapple transport.
//!
//! Layers compose over the transport's request/raw-response service via
//! [`HyperTransportBuilder::layer`](crate::HyperTransportBuilder::layer).
//! The last layer added is the innermost; the first added processes
//! requests first.
//!
//! Only [`LoggingLayer`] ships here. Policies like retry, auth, or rate
//! limiting are transport-side concerns callers can bring as their own
//! Tower layers through the same seam.

mod logging;

pub use logging::{LogLevel, Logging, LoggingLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
