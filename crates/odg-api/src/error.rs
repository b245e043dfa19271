//! Error types for the Open Delivery Gear API client.

/// Errors returned by calls against the Open Delivery Gear API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The remote service answered with a non-success HTTP status.
    #[error("HTTP {status_code} from {method} {path}: {body}")]
    Status {
        /// HTTP status code returned by the remote service.
        status_code: u16,
        /// HTTP method of the failed request.
        method: String,
        /// Request path of the failed request.
        path: String,
        /// Response body, if any.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("Invalid response from {path}: {message}")]
    Decode {
        /// Request path of the request.
        path: String,
        /// Description of the decode failure.
        message: String,
    },

    /// The client was configured with invalid settings.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(
        status_code: u16,
        method: impl Into<String>,
        path: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::Status {
            status_code,
            method: method.into(),
            path: path.into(),
            body: body.into(),
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns the HTTP status code, if the remote service answered at all.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
