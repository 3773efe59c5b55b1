//! Error types for the session layer.

use linecast_transport::ConnectionId;

use crate::SessionState;

/// Errors that can occur while negotiating or driving a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The trimmed username is shorter or longer than allowed.
    #[error("username length {length} outside {min}-{max} characters")]
    InvalidUsername {
        length: usize,
        min: usize,
        max: usize,
    },

    /// The peer went away before answering the username prompt.
    #[error("connection closed before handshake completed")]
    HandshakeAborted,

    /// The peer did not answer the username prompt in time.
    #[error("handshake timed out")]
    HandshakeTimedOut,

    /// The outbound queue has no room left. The client is not keeping up.
    #[error("outbound queue full for {0}")]
    QueueFull(ConnectionId),

    /// The outbound queue's reader is gone.
    #[error("outbound queue closed for {0}")]
    QueueClosed(ConnectionId),

    /// A lifecycle transition that skips or rewinds a phase.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}
