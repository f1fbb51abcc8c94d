//! Incoming frames, before payload decoding.

use std::fmt;

/// Event name used for frames that arrive without an explicit event name.
pub const MESSAGE_EVENT: &str = "message";

/// One unit of pushed data: an event name and an undecoded payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    event_name: String,
    payload: String,
}

impl RawFrame {
    /// Create a frame. An empty event name becomes [`MESSAGE_EVENT`].
    pub fn new(event_name: impl Into<String>, payload: impl Into<String>) -> Self {
        let mut event_name = event_name.into();
        if event_name.is_empty() {
            event_name.push_str(MESSAGE_EVENT);
        }
        Self {
            event_name,
            payload: payload.into(),
        }
    }

    /// Create an unnamed frame, delivered to the `"message"` listener.
    pub fn message(payload: impl Into<String>) -> Self {
        Self::new(MESSAGE_EVENT, payload)
    }

    /// The event name.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// The undecoded payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns `true` if this frame belongs to the default `"message"` event.
    pub fn is_default_event(&self) -> bool {
        self.event_name == MESSAGE_EVENT
    }

    /// Consume the frame, returning `(event_name, payload)`.
    pub fn into_parts(self) -> (String, String) {
        (self.event_name, self.payload)
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.event_name, self.payload.len())
    }
}
