//! Error types for vodstream-media.

use std::io;
use thiserror::Error;

/// Result type for vodstream-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for vodstream-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed playlist text.
    #[error("Invalid playlist (line {line}): {message}")]
    InvalidPlaylist { line: usize, message: String },

    /// Unsupported feature or encryption method.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Decryption failed.
    #[error("Decryption failed: {0}")]
    Crypto(String),
}

impl Error {
    /// Create an invalid playlist error.
    pub fn invalid_playlist(line: usize, msg: impl Into<String>) -> Self {
        Self::InvalidPlaylist {
            line,
            message: msg.into(),
        }
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a crypto error.
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }
}

impl From<Error> for vodstream_common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => Self::Io(e),
            Error::InvalidPlaylist { line, message } => Self::Parse { line, message },
            Error::Unsupported(msg) | Error::InvalidUrl(msg) => Self::InvalidInput(msg),
            Error::Crypto(msg) => Self::Crypto(msg),
        }
    }
}
