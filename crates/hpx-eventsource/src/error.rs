//! Error types for the event stream client.
//!
//! Errors fall into two groups:
//!
//! - [`ClientError`]: programming errors returned synchronously at the call
//!   site (bad endpoint, empty event name, invalid configuration).
//! - [`StreamError`]: errors raised by the receive loop, delivered only through
//!   the registered error handler. It is either a [`ConnectionError`] (the
//!   connection could not be opened or died) or a [`DispatchError`] (a frame's
//!   payload could not be decoded).

use std::time::Duration;

use thiserror::Error;

/// Result type for synchronous client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned synchronously by the client API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The endpoint is empty or not a usable URL.
    #[error("Invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// An event name passed to a registration method was empty.
    #[error("Event name cannot be empty")]
    EmptyEventName,

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ClientError {
    /// Create an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// The connection could not be opened, or failed while open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The transport could not reach the endpoint.
    #[error("Failed to open connection to {endpoint}: {message}")]
    Open { endpoint: String, message: String },

    /// Opening the connection did not finish in time.
    #[error("Connection to {endpoint} timed out after {duration:?}")]
    Timeout { endpoint: String, duration: Duration },

    /// The transport failed while the connection was open.
    #[error("Connection lost: {message}")]
    Lost { message: String },

    /// The remote side ended the stream.
    #[error("Event stream ended")]
    StreamEnded,
}

impl ConnectionError {
    /// Create an open failure.
    pub fn open(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Open {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(endpoint: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
            duration,
        }
    }

    /// Create a connection-lost error.
    pub fn lost(message: impl Into<String>) -> Self {
        Self::Lost {
            message: message.into(),
        }
    }

    /// Create a stream-ended error.
    pub fn stream_ended() -> Self {
        Self::StreamEnded
    }
}

/// A payload could not be decoded.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DecodeError {
    /// Create a decode error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error wrapping an underlying error.
    pub fn custom<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::custom(e)
    }
}

/// A received frame whose payload could not be decoded.
#[derive(Error, Debug)]
#[error("Failed to decode `{event_name}` payload: {cause}")]
pub struct DispatchError {
    /// Name of the event the frame arrived under.
    pub event_name: String,
    /// The undecoded payload text.
    pub raw_payload: String,
    /// Why decoding failed.
    #[source]
    pub cause: DecodeError,
}

impl DispatchError {
    /// Create a dispatch error.
    pub fn new(
        event_name: impl Into<String>,
        raw_payload: impl Into<String>,
        cause: DecodeError,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            raw_payload: raw_payload.into(),
            cause,
        }
    }
}

/// Everything the error handler can receive.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Connection failure. The client is `Closed` when this is delivered.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Decode failure. The connection stays open.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl StreamError {
    /// Returns `true` for connection failures.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` for decode failures.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// The connection error, if this is one.
    pub fn as_connection(&self) -> Option<&ConnectionError> {
        match self {
            Self::Connection(e) => Some(e),
            Self::Dispatch(_) => None,
        }
    }

    /// The dispatch error, if this is one.
    pub fn as_dispatch(&self) -> Option<&DispatchError> {
        match self {
            Self::Dispatch(e) => Some(e),
            Self::Connection(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ClientError::config("zero timeout");
        assert!(matches!(err, ClientError::Config { .. }));

        let err = ConnectionError::timeout("stream://test", Duration::from_secs(5));
        assert!(matches!(err, ConnectionError::Timeout { .. }));

        let err = ConnectionError::lost("reset by peer");
        assert_eq!(err.to_string(), "Connection lost: reset by peer");
    }

    #[test]
    fn test_decode_error_from_serde_keeps_source() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not-json")
            .expect_err("should not parse");
        let err = DecodeError::from(serde_err);
        assert!(err.source().is_some());
        assert!(!err.message().is_empty());
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::new("notify", "not-json", DecodeError::new("bad payload"));
        assert_eq!(
            err.to_string(),
            "Failed to decode `notify` payload: bad payload"
        );
        assert_eq!(err.raw_payload, "not-json");
    }

    #[test]
    fn test_stream_error_kinds() {
        let err = StreamError::from(ConnectionError::stream_ended());
        assert!(err.is_connection());
        assert!(!err.is_dispatch());
        assert_eq!(err.as_connection(), Some(&ConnectionError::StreamEnded));

        let err = StreamError::from(DispatchError::new("a", "b", DecodeError::new("c")));
        assert!(err.is_dispatch());
        assert_eq!(err.as_dispatch().map(|e| e.event_name.as_str()), Some("a"));
    }
}
