use thiserror::Error;

/// Application-wide error types for Scout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed before a status code was available.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Server answered 429 Too Many Requests.
    #[error("Rate limited by {url}")]
    RateLimited { url: String },

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Language detector could not classify the input.
    #[error("Language detection failed: {0}")]
    LanguageDetection(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Network identity could not be observed or rotated.
    #[error("Identity error: {0}")]
    IdentityError(String),
}

impl AppError {
    /// Returns true if the server explicitly asked us to slow down.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. } | AppError::HttpStatus { status: 429, .. }
        )
    }
}
