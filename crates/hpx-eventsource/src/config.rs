//! Client configuration.

use std::time::Duration;

use crate::{
    decode::DecodeMode,
    endpoint::Endpoint,
    error::{ClientError, ClientResult},
};

/// Configuration for an [`EventStreamClient`](crate::EventStreamClient).
///
/// Provides sensible defaults and chainable setter methods.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Event stream endpoint.
    pub endpoint: String,
    /// Upper bound on how long opening a connection may take.
    pub connect_timeout: Duration,
    /// Built-in payload decoder.
    pub decode_mode: DecodeMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout: Duration::from_secs(10),
            decode_mode: DecodeMode::Json,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the built-in payload decoder.
    #[must_use]
    pub fn decode_mode(mut self, mode: DecodeMode) -> Self {
        self.decode_mode = mode;
        self
    }

    /// Validate the configuration, returning the parsed endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] for a bad endpoint and
    /// [`ClientError::Config`] for any other invalid field.
    pub fn validate(&self) -> ClientResult<Endpoint> {
        let endpoint = Endpoint::parse(&self.endpoint)?;
        if self.connect_timeout.is_zero() {
            return Err(ClientError::config("Connect timeout must be > 0"));
        }
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.endpoint.is_empty());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.decode_mode, DecodeMode::Json);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::new("stream://test")
            .connect_timeout(Duration::from_millis(250))
            .decode_mode(DecodeMode::Text);

        assert_eq!(config.endpoint, "stream://test");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.decode_mode, DecodeMode::Text);
    }

    #[test]
    fn test_validation_empty_endpoint() {
        let result = ClientConfig::default().validate();
        assert!(matches!(result, Err(ClientError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let result = ClientConfig::new("stream://test")
            .connect_timeout(Duration::ZERO)
            .validate();
        assert_eq!(
            result.expect_err("should fail"),
            ClientError::config("Connect timeout must be > 0")
        );
    }

    #[test]
    fn test_validation_valid_config() {
        let endpoint = ClientConfig::new("https://example.com/events")
            .validate()
            .expect("valid config");
        assert_eq!(endpoint.as_str(), "https://example.com/events");
    }
}
