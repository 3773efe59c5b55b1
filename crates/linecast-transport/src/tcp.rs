//! Newline-framed TCP transport.
//!
//! Each accepted socket is split into halves. The read half sits behind
//! its own lock so a reader parked in `recv_line` never holds up a
//! writer. A `watch` flag carries the local close to both sides: pending
//! reads return `Ok(None)`, pending writes fail, and the flag can only be
//! raised once.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Longest line, in bytes and excluding the terminator, a peer may send.
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_line_len: usize,
    shut_down: AtomicBool,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(addr).await.map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Sets the maximum line length for connections accepted from now on.
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }

        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        let (closed, _) = watch::channel(false);

        Ok(TcpConnection {
            id,
            peer: addr,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            closed,
            max_line_len: self.max_line_len,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            tracing::info!("TCP transport no longer accepting");
        }
        Ok(())
    }
}

/// A single TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
    max_line_len: usize,
}

impl TcpConnection {
    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(TransportError::ConnectionClosed(
                "closed locally".into(),
            ));
        }

        let mut writer = self.writer.lock().await;
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => {
                Err(TransportError::ConnectionClosed("closed locally".into()))
            }
            res = writer.write_all(data) => res.map_err(TransportError::SendFailed),
        }
    }

    async fn recv_line(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        let mut reader = self.reader.lock().await;
        let mut line = Vec::new();
        // Two extra bytes leave room for a `\r\n` after a maximal line.
        let mut limited = (&mut *reader).take(self.max_line_len as u64 + 2);

        let read = tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => return Ok(None),
            res = limited.read_until(b'\n', &mut line) => {
                res.map_err(TransportError::ReceiveFailed)?
            }
        };

        if read == 0 {
            return Ok(None);
        }

        if line.last() != Some(&b'\n') {
            if line.len() > self.max_line_len {
                return Err(TransportError::LineTooLong {
                    limit: self.max_line_len,
                });
            }
            // Peer hung up in the middle of a line.
            return Ok(None);
        }

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.max_line_len {
            return Err(TransportError::LineTooLong {
                limit: self.max_line_len,
            });
        }
        Ok(Some(line))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let first = self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        });
        if !first {
            return Ok(());
        }

        tracing::debug!(id = %self.id, peer = %self.peer, "closing connection");
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e)),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
