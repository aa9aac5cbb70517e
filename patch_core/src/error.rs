//! Error types for the patch_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for patch_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Segment construction or interval arithmetic error
    #[error("Segment error: {0}")]
    Segment(String),

    /// Basal profile validation error
    #[error("Profile error: {0}")]
    Profile(String),

    /// Status frame decoding error
    #[error("Frame error: {0}")]
    Frame(String),
}
