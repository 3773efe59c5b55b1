//! Error types for the dispatch layer.

use linecast_session::SessionError;

/// Errors returned by [`DispatchHandle`](crate::DispatchHandle).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The room already holds `capacity` members.
    #[error("server is full ({capacity} members)")]
    ServerFull { capacity: usize },

    /// The engine has shut down and accepts no more events.
    #[error("dispatch engine is unavailable")]
    Unavailable,

    /// The session could not be admitted in its current phase.
    #[error(transparent)]
    Session(#[from] SessionError),
}
