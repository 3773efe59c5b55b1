//! Delivery pumps: one future reading from a client, one writing to it.
//!
//! The two run concurrently on the connection's task and block on
//! separate halves of the socket. Neither tears the session down itself:
//! the inbound pump asks the dispatch engine to deregister, and the
//! outbound pump closes the connection when its queue ends or a write
//! fails, which in turn wakes the inbound pump.

use std::sync::Arc;

use linecast_dispatch::DispatchHandle;
use linecast_protocol::{ClientLine, ServerLine, decode_line, encode_line};
use linecast_session::OutboundQueue;
use linecast_transport::Connection;

/// Reads lines from the client and turns them into broadcasts until the
/// client leaves, then submits exactly one deregistration.
pub(crate) async fn inbound_pump<C: Connection>(
    conn: Arc<C>,
    name: String,
    dispatch: DispatchHandle<C>,
) {
    let id = conn.id();

    loop {
        let raw = match conn.recv_line().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(%id, name = %name, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%id, name = %name, error = %e, "read failed");
                break;
            }
        };

        let text = match decode_line(raw) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(%id, name = %name, error = %e, "undecodable line");
                break;
            }
        };

        match ClientLine::from(text) {
            ClientLine::Exit => {
                tracing::debug!(%id, name = %name, "client sent exit");
                break;
            }
            ClientLine::Empty => {}
            ClientLine::Text(text) => {
                let line = ServerLine::chat_now(name.as_str(), text).to_string();
                tracing::debug!(%id, "{line}");
                if dispatch.broadcast(line).is_err() {
                    break;
                }
            }
        }
    }

    // Ignored once the engine has stopped; there is nothing left to leave.
    let _ = dispatch.deregister(id);
}

/// Writes queued lines to the client until the queue ends or a write
/// fails, then closes the connection.
pub(crate) async fn outbound_pump<C: Connection>(conn: Arc<C>, mut queue: OutboundQueue) {
    let id = conn.id();

    while let Some(line) = queue.next().await {
        if let Err(e) = conn.send(&encode_line(&line)).await {
            tracing::debug!(%id, error = %e, "write failed");
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%id, error = %e, "close failed");
    }
}
