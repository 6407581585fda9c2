//! Errors raised while framing or decoding protocol messages

use std::io;

/// Frame and message decoding failures.
///
/// Every variant is fatal to the connection it occurred on.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("received an empty frame")]
    EmptyFrame,

    #[error("stream ended inside a frame ({buffered} bytes without terminator)")]
    TruncatedFrame { buffered: usize },

    #[error("invalid JSON in frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unexpected unit message: {0:?}")]
    UnexpectedUnitMessage(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("invalid UUID in {tag} message: {source}")]
    InvalidUuid {
        tag: &'static str,
        #[source]
        source: uuid::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Build a [`ProtocolError::FrameTooLarge`] against the given limit.
    pub fn too_large(size: usize, limit: usize) -> Self {
        ProtocolError::FrameTooLarge { size, limit }
    }
}
