//! Error types for the protocol layer.

/// Errors that can occur while decoding client lines.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The line was not valid UTF-8.
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
