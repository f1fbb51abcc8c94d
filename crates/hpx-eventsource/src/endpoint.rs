//! Connection target for an event stream.

use std::fmt;

use url::Url;

use crate::error::{ClientError, ClientResult};

/// Validated, immutable connection target.
///
/// Any scheme is accepted (`https://`, `stream://`, ...) as long as the URL
/// has a non-empty host. The original text is preserved for display and
/// for the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    raw: String,
    url: Url,
}

impl Endpoint {
    /// Parse and validate an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if the text is empty, is not a
    /// URL, or has no host.
    pub fn parse(endpoint: &str) -> ClientResult<Self> {
        let raw = endpoint.trim();
        if raw.is_empty() {
            return Err(ClientError::invalid_endpoint(endpoint, "endpoint is empty"));
        }

        let url = Url::parse(raw)
            .map_err(|e| ClientError::invalid_endpoint(endpoint, e.to_string()))?;

        if url.host_str().is_none_or(str::is_empty) {
            return Err(ClientError::invalid_endpoint(endpoint, "missing host"));
        }

        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    /// The endpoint as given (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The URL scheme, e.g. `https`.
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// The parsed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Endpoint {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_custom_scheme() {
        let endpoint = Endpoint::parse("stream://test").expect("valid endpoint");
        assert_eq!(endpoint.as_str(), "stream://test");
        assert_eq!(endpoint.scheme(), "stream");
        assert_eq!(endpoint.to_string(), "stream://test");
    }

    #[test]
    fn test_parse_http_with_query() {
        let endpoint = Endpoint::parse("  http://localhost:8080/sse/subscribe?id=user123 ")
            .expect("valid endpoint");
        assert_eq!(
            endpoint.as_str(),
            "http://localhost:8080/sse/subscribe?id=user123"
        );
        assert_eq!(endpoint.url().port(), Some(8080));
    }

    #[test]
    fn test_parse_empty() {
        let err = Endpoint::parse("   ").expect_err("should fail");
        assert!(matches!(err, ClientError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_parse_not_a_url() {
        let err = Endpoint::parse("not a url").expect_err("should fail");
        assert!(matches!(err, ClientError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_parse_missing_host() {
        let err = Endpoint::parse("mailto:someone").expect_err("should fail");
        assert_eq!(
            err,
            ClientError::invalid_endpoint("mailto:someone", "missing host")
        );
    }

    #[test]
    fn test_from_str() {
        let endpoint: Endpoint = "https://example.com/stream".parse().expect("valid endpoint");
        assert_eq!(endpoint.scheme(), "https");
    }
}
