//! Unified error type for the Linecast server.

use linecast_dispatch::DispatchError;
use linecast_protocol::ProtocolError;
use linecast_session::SessionError;
use linecast_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `linecast` crate you deal with this single error type
/// instead of importing errors from each layer. The `#[from]` attribute
/// on each variant generates the `From` impl, so `?` converts layer
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LinecastError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (undecodable line).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad username, handshake aborted).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A dispatch-level error (room full, engine stopped).
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
