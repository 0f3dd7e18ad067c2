//! Error types for the directory configuration provider.

use thiserror::Error;

/// Errors that can occur while managing configuration objects.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested configuration object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration object already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Configuration API temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Request timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The configuration API rejected the request as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other non-success response from the configuration API.
    #[error("Configuration API error (HTTP {status}): {message}")]
    Api {
        /// The HTTP status code returned by the server.
        status: u16,
        /// The error message from the response body.
        message: String,
    },
}

impl ProviderError {
    /// Map an HTTP status returned by the configuration API to an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsconfig_provider::ProviderError;
    ///
    /// let err = ProviderError::from_status(404, "change-subscriptions/audit");
    /// assert!(err.is_not_found());
    ///
    /// let err = ProviderError::from_status(500, "boom");
    /// assert_eq!(err.status(), Some(500));
    /// ```
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 422 => Self::InvalidRequest(message),
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            412 => Self::FailedPrecondition(message),
            429 => Self::ResourceExhausted(message),
            501 => Self::Unimplemented(message),
            503 => Self::Unavailable(message),
            504 => Self::DeadlineExceeded(message),
            status => Self::Api { status, message },
        }
    }

    /// The HTTP status this error corresponds to, if it came from the API.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidRequest(_) => Some(400),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::FailedPrecondition(_) => Some(412),
            Self::ResourceExhausted(_) => Some(429),
            Self::Unimplemented(_) => Some(501),
            Self::Unavailable(_) => Some(503),
            Self::DeadlineExceeded(_) => Some(504),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error means the object does not exist on the server.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Api { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("entry-caches/fifo".to_string());
        assert_eq!(format!("{}", err), "Resource not found: entry-caches/fifo");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("dsconfig_widget".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: dsconfig_widget");

        let err = ProviderError::Api {
            status: 500,
            message: "internal".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Configuration API error (HTTP 500): internal"
        );
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ProviderError::from_status(400, "x"),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, "x"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, "x"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(ProviderError::from_status(404, "x").is_not_found());
        assert!(matches!(
            ProviderError::from_status(409, "x"),
            ProviderError::AlreadyExists(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, "x"),
            ProviderError::ResourceExhausted(_)
        ));
        assert!(matches!(
            ProviderError::from_status(503, "x"),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            ProviderError::from_status(504, "x"),
            ProviderError::DeadlineExceeded(_)
        ));
        assert!(matches!(
            ProviderError::from_status(502, "x"),
            ProviderError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_status_round_trips_for_api_errors() {
        for status in [400, 403, 404, 409, 412, 429, 501, 503, 504, 500] {
            assert_eq!(ProviderError::from_status(status, "x").status(), Some(status));
        }
        assert_eq!(ProviderError::Validation("x".into()).status(), None);
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("entry-123".to_string());
        assert_eq!(err.message(), "entry-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::from_status(502, "bad gateway");
        assert_eq!(err.message(), "bad gateway");
    }
}
