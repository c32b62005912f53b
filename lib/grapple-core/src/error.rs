//! Error types for grapple.

use derive_more::{Display, Error, From};

/// Main error type for grapple operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Binding-time misconfiguration: no matching converter or adapter,
    /// a reserved response type, or a malformed endpoint descriptor.
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Configuration(#[error(not(source))] String),

    /// Arguments passed at invocation time do not fit the endpoint descriptor.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The call was canceled before it completed.
    #[display("call canceled")]
    #[from(skip)]
    Canceled,

    /// The call was already started; a call instance is single-use.
    #[display("call already executed")]
    #[from(skip)]
    AlreadyExecuted,

    /// A body converter rejected the payload or produced the wrong type.
    #[display("conversion error: {_0}")]
    #[from(skip)]
    Conversion(#[error(not(source))] String),

    /// Non-success HTTP status unwrapped into a failure by the body-shaped
    /// return adapter. At the envelope level a non-2xx status is data, not
    /// an error.
    #[display("HTTP error {status}: {message}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Buffered error payload, if any.
        #[error(not(source))]
        body: Option<bytes::Bytes>,
    },

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_html_form::ser::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a conversion error.
    #[must_use]
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if the call was canceled.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if this is a binding-time configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns the HTTP status code if this is an [`Error::Http`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the buffered payload if this is an [`Error::Http`] with a body.
    #[must_use]
    pub fn body(&self) -> Option<&bytes::Bytes> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// Best-effort duplicate, used when a fault must be both recorded and
    /// propagated. Transport-class variants keep their kind; anything
    /// non-duplicable collapses to a connection error carrying the display
    /// text.
    pub(crate) fn mirror(&self) -> Self {
        match self {
            Self::Timeout => Self::Timeout,
            Self::Canceled => Self::Canceled,
            Self::Connection(message) => Self::Connection(message.clone()),
            Self::Tls(message) => Self::Tls(message.clone()),
            other => Self::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::configuration("no converter for `User`");
        assert_eq!(
            err.to_string(),
            "configuration error: no converter for `User`"
        );

        let err = Error::Timeout;
        assert_eq!(err.to_string(), "request timeout");

        let err = Error::Canceled;
        assert_eq!(err.to_string(), "call canceled");

        let err = Error::AlreadyExecuted;
        assert_eq!(err.to_string(), "call already executed");

        let err = Error::json_deserialization("user.address.city", "missing field `city`");
        assert_eq!(
            err.to_string(),
            "JSON deserialization error at 'user.address.city': missing field `city`"
        );
    }

    #[test]
    fn error_observers() {
        assert!(Error::Timeout.is_timeout());
        assert!(Error::Canceled.is_canceled());
        assert!(Error::connection("refused").is_connection());
        assert!(Error::configuration("bad").is_configuration());
        assert!(!Error::Timeout.is_connection());
    }

    #[test]
    fn error_http_status_and_body() {
        let body = bytes::Bytes::from(r#"{"error":"not found"}"#);
        let err = Error::Http {
            status: 404,
            message: "Not Found".to_string(),
            body: Some(body.clone()),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body(), Some(&body));
        assert_eq!(err.to_string(), "HTTP error 404: Not Found");

        assert_eq!(Error::Timeout.status(), None);
        assert!(Error::Timeout.body().is_none());
    }

    #[test]
    fn mirror_keeps_transport_kinds() {
        assert!(Error::Timeout.mirror().is_timeout());
        assert!(Error::Canceled.mirror().is_canceled());
        assert!(Error::connection("reset").mirror().is_connection());

        // Non-duplicable kinds collapse but keep their message.
        let mirrored = Error::conversion("bad payload").mirror();
        assert!(mirrored.is_connection());
        assert!(mirrored.to_string().contains("bad payload"));
    }
}
