//! Provider error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

/// Error that can occur while talking to a Facility Management System.
#[derive(Debug, Error)]
pub enum ProviderError {
    // Connection errors (transient)
    /// Failed to reach the FMS.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single provider call timed out.
    #[error("provider call timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The FMS asked us to slow down.
    #[error("rate limited by provider{}", .retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    // Authentication errors (permanent)
    /// Credentials were rejected by the FMS.
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // Payload errors (permanent)
    /// The FMS answered with something we cannot interpret.
    #[error("malformed response: {message}")]
    MalformedResponse {
        message: String,
        /// Raw payload kept for diagnosis.
        raw: Option<String>,
    },

    // Configuration errors (permanent)
    /// Provider configuration is invalid.
    #[error("invalid provider configuration: {message}")]
    InvalidConfiguration { message: String },

    /// No adapter is registered for the provider type.
    #[error("unsupported provider type: {provider_type}")]
    UnsupportedProvider { provider_type: String },
}

impl ProviderError {
    /// Check if this error is transient and the call should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::ConnectionFailed { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::RateLimited { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProviderError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ProviderError::Timeout { .. } => "TIMEOUT",
            ProviderError::RateLimited { .. } => "RATE_LIMITED",
            ProviderError::AuthenticationFailed { .. } => "AUTH_FAILED",
            ProviderError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            ProviderError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ProviderError::UnsupportedProvider { .. } => "UNSUPPORTED_PROVIDER",
        }
    }

    /// Raw payload attached to a malformed response, if any.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            ProviderError::MalformedResponse { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }

    /// Raw payload cut to at most `max` bytes, for log lines.
    pub fn raw_payload_preview(&self, max: usize) -> Option<&str> {
        self.raw_payload().map(|raw| {
            if raw.len() <= max {
                return raw;
            }
            let mut end = max;
            while !raw.is_char_boundary(end) {
                end -= 1;
            }
            &raw[..end]
        })
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ProviderError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProviderError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        ProviderError::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Create a rate limited error.
    pub fn rate_limited(retry_after_secs: Option<u64>) -> Self {
        ProviderError::RateLimited { retry_after_secs }
    }

    /// Create a malformed response error carrying the raw payload.
    pub fn malformed(message: impl Into<String>, raw: Option<String>) -> Self {
        ProviderError::MalformedResponse {
            message: message.into(),
            raw,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        ProviderError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let transient_errors = vec![
            ProviderError::connection_failed("refused"),
            ProviderError::Timeout { timeout_secs: 5 },
            ProviderError::rate_limited(Some(30)),
        ];

        for err in transient_errors {
            assert!(
                err.is_transient(),
                "Expected {} to be transient",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_permanent_errors() {
        let permanent_errors = vec![
            ProviderError::auth("bad api key"),
            ProviderError::malformed("missing tenants array", Some("{}".to_string())),
            ProviderError::invalid_config("missing site id"),
            ProviderError::UnsupportedProvider {
                provider_type: "acme".to_string(),
            },
        ];

        for err in permanent_errors {
            assert!(
                err.is_permanent(),
                "Expected {} to be permanent",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProviderError::rate_limited(Some(30)).to_string(),
            "rate limited by provider (retry after 30s)"
        );
        assert_eq!(
            ProviderError::rate_limited(None).to_string(),
            "rate limited by provider"
        );
        assert_eq!(
            ProviderError::Timeout { timeout_secs: 5 }.to_string(),
            "provider call timed out after 5 seconds"
        );
    }

    #[test]
    fn test_raw_payload() {
        let err = ProviderError::malformed("bad json", Some("{\"tenants\":".to_string()));
        assert_eq!(err.raw_payload(), Some("{\"tenants\":"));
        assert!(ProviderError::auth("nope").raw_payload().is_none());
    }

    #[test]
    fn test_raw_payload_preview_respects_char_boundaries() {
        let err = ProviderError::malformed("bad", Some("ééé".to_string()));
        assert_eq!(err.raw_payload_preview(3), Some("é"));
        assert_eq!(err.raw_payload_preview(100), Some("ééé"));
    }
}
