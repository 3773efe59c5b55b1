//! Transport abstraction layer for Linecast.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how participants reach the relay, plus [`TcpTransport`], the
//! newline-framed TCP implementation the server ships with.
//!
//! A [`Connection`] is shared between two tasks (the inbound and the
//! outbound pump), so every method takes `&self` and reading never waits
//! on writing.

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{DEFAULT_MAX_LINE_LEN, TcpConnection, TcpTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
///
/// Ids are handed out in increasing order, so sorting by `ConnectionId`
/// sorts by accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;

    /// Stops handing out new connections.
    fn shutdown(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A single line-oriented connection.
///
/// The returned futures are `Send` so generic code (the dispatch engine,
/// the pumps) can drive them from spawned Tokio tasks.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Writes `data` to the peer as-is. No terminator is appended.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Reads the next `\n`-terminated line, without its terminator.
    ///
    /// Returns `Ok(None)` when the peer closed the connection or when
    /// [`close`](Self::close) has been called locally.
    fn recv_line(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection. Only the first call has an effect; pending
    /// and later `send`/`recv_line` calls observe the closure.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns `true` once [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
