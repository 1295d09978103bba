//! Error types for the PayPipe client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by [`PipelineClient`](crate::PipelineClient) calls
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if the server could not plan the request (422)
    pub fn is_unplannable(&self) -> bool {
        matches!(self, Self::ApiError { status: 422, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let not_found = ClientError::api_error(404, "Pipeline x not found");
        assert!(not_found.is_not_found());
        assert!(not_found.is_client_error());
        assert!(!not_found.is_unplannable());

        let unplannable = ClientError::api_error(422, "could not create a plan for this query");
        assert!(unplannable.is_unplannable());
        assert_eq!(
            unplannable.to_string(),
            "API error (status 422): could not create a plan for this query"
        );

        assert!(!ClientError::ParseError("x".to_string()).is_client_error());
    }
}
