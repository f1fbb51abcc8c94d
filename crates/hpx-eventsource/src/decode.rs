//! Payload decoders.
//!
//! Each client owns exactly one [`PayloadDecoder`]. Every listener registered
//! with [`on`](crate::EventStreamClient::on) receives that decoder's output,
//! and a decode failure is reported as a
//! [`DispatchError`](crate::DispatchError). Listeners registered with
//! [`on_raw`](crate::EventStreamClient::on_raw) skip the decoder entirely.

use std::fmt;

use serde_json::Value;

use crate::error::DecodeError;

/// Turns a raw payload into a structured value.
pub trait PayloadDecoder: Send + Sync + 'static {
    /// Decode a payload.
    fn decode(&self, raw: &str) -> Result<Value, DecodeError>;
}

impl<F> PayloadDecoder for F
where
    F: Fn(&str) -> Result<Value, DecodeError> + Send + Sync + 'static,
{
    fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        self(raw)
    }
}

/// Decodes payloads as JSON. This is the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl PayloadDecoder for JsonDecoder {
    fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Passes payloads through as JSON strings. Never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextDecoder;

impl PayloadDecoder for TextDecoder {
    fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        Ok(Value::String(raw.to_string()))
    }
}

/// Built-in decoder selection for [`ClientConfig`](crate::ClientConfig).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeMode {
    /// [`JsonDecoder`].
    #[default]
    Json,
    /// [`TextDecoder`].
    Text,
}

impl DecodeMode {
    pub(crate) fn decoder(self) -> Box<dyn PayloadDecoder> {
        match self {
            Self::Json => Box::new(JsonDecoder),
            Self::Text => Box::new(TextDecoder),
        }
    }
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "Json"),
            Self::Text => write!(f, "Text"),
        }
    }
}
