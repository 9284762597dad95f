//! Error handling for the camwatch pipeline

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Capture source unavailable or failed mid-stream
    #[error("Device error: {0}")]
    Device(String),

    /// Unknown camera, disabled detection type, or malformed data
    #[error("Validation error: {0}")]
    Validation(String),

    /// Detection capability failure
    #[error("Inference error: {0}")]
    Inference(String),

    /// Alert store or evidence write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Notification sink failure
    #[error("Notification error: {0}")]
    Notification(String),

    /// Buffer allocation or worker spawn failure (fatal)
    #[error("Startup error: {0}")]
    Startup(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
