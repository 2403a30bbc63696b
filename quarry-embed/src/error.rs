//! Error types for the embedding client

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
/// Used throughout the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems, transport failures, and provider responses
/// that cannot be used. Transport and server-side failures are retryable at
/// the batch level; the remaining variants are not.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// No API key available from configuration or the environment
    #[error("embedding API key not configured: set {env_var}")]
    MissingApiKey { env_var: String },

    /// Error when the client configuration is invalid
    #[error("invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// The provider rejected the request with a non-retryable status
    #[error("embedding API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider response could not be interpreted
    #[error("malformed embedding response: {message}")]
    MalformedResponse { message: String },

    /// The provider returned vectors of an unexpected dimension
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// HTTP transport errors from the underlying client
    #[error("embedding transport error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed-response error with a custom message.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}
