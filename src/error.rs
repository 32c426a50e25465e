//! Error types for the snapshot manager

use thiserror::Error;

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the snapshot manager
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (empty snapshot id)
    #[error("Invalid snapshot configuration: {0}")]
    Config(String),

    /// Stored record could not be decoded as a snapshot
    #[error("Stored snapshot could not be decoded: {0}")]
    Deserialize(String),

    /// An image failed to finish loading during inlining
    #[error("Image load failed: {0}")]
    ImageLoad(String),

    /// An image could not be rasterized or encoded
    #[error("Image encoding failed: {0}")]
    ImageEncode(String),

    /// The storage backend refused a read or write
    #[error("Storage backend error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialize(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageEncode(err.to_string())
    }
}
