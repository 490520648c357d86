use thiserror::Error;

use crate::audio::decode::DecodeError;

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the reading/playback core
#[derive(Error, Debug)]
pub enum Error {
    /// The segmentation service failed or returned an unusable response
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// The synthesis service failed or returned no audio payload
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// The audio payload could not be decoded
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Audio output device unavailable or failed to start
    #[error("Playback failed: {0}")]
    Playback(String),

    /// Missing or invalid configuration (e.g. no API key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error talking to a remote service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
