//! Per-connection handler: handshake, admission, and pump startup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Send the username prompt, read one line → validate the name
//!   2. Check the room's size → reject early if it is already full
//!   3. Queue the welcome banner, register with the dispatch engine
//!   4. Run the inbound and outbound pumps side by side until both end

use std::sync::Arc;

use linecast_dispatch::{DispatchError, DispatchHandle};
use linecast_protocol::{
    SERVER_FULL, ServerLine, USERNAME_PROMPT, decode_line, invalid_username_notice,
};
use linecast_session::{Session, SessionConfig, SessionError, validate_username};
use linecast_transport::{Connection, TcpConnection};

use crate::LinecastError;
use crate::pumps::{inbound_pump, outbound_pump};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) dispatch: DispatchHandle<TcpConnection>,
    pub(crate) session_config: SessionConfig,
    pub(crate) max_sessions: usize,
}

/// Handles a single connection from accept to close.
///
/// A connection rejected before admission is closed here and the reason
/// is returned as the error. Once admitted, closing is up to the pumps
/// and the dispatch engine.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), LinecastError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let name = match perform_handshake(&conn, &state.session_config).await {
        Ok(name) => name,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    // Fast path. The engine checks again when it applies the registration.
    if state.dispatch.membership().len().await >= state.max_sessions {
        reject_full(&conn).await;
        return Err(DispatchError::ServerFull {
            capacity: state.max_sessions,
        }
        .into());
    }

    let (session, queue) =
        Session::new(Arc::clone(&conn), name.clone(), &state.session_config);
    // Queued ahead of registration so it is the first thing the client sees.
    let welcome = ServerLine::Welcome { name: name.clone() }.to_string();
    if let Err(e) = session.try_enqueue(welcome) {
        let _ = conn.close().await;
        return Err(e.into());
    }

    match state.dispatch.register(session).await {
        Ok(()) => {}
        Err(e @ DispatchError::ServerFull { .. }) => {
            reject_full(&conn).await;
            return Err(e.into());
        }
        Err(e) => {
            let _ = conn.close().await;
            return Err(e.into());
        }
    }

    tracing::debug!(%conn_id, name = %name, "admitted, starting pumps");

    // Both pumps live on this task, so aborting it stops them too.
    tokio::join!(
        inbound_pump(Arc::clone(&conn), name, state.dispatch.clone()),
        outbound_pump(Arc::clone(&conn), queue),
    );
    tracing::debug!(%conn_id, "pumps finished");

    Ok(())
}

/// Prompts for a username and returns it once it passes validation.
async fn perform_handshake(
    conn: &TcpConnection,
    config: &SessionConfig,
) -> Result<String, LinecastError> {
    conn.send(USERNAME_PROMPT.as_bytes()).await?;

    let reply = match config.handshake_timeout {
        Some(limit) => tokio::time::timeout(limit, conn.recv_line())
            .await
            .map_err(|_| SessionError::HandshakeTimedOut)?,
        None => conn.recv_line().await,
    }?;

    let Some(raw) = reply else {
        return Err(SessionError::HandshakeAborted.into());
    };
    let text = decode_line(raw)?;

    match validate_username(&text, config) {
        Ok(name) => Ok(name),
        Err(e) => {
            let notice =
                invalid_username_notice(config.min_name_len, config.max_name_len);
            conn.send(notice.as_bytes()).await?;
            Err(e.into())
        }
    }
}

async fn reject_full(conn: &TcpConnection) {
    if let Err(e) = conn.send(SERVER_FULL.as_bytes()).await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "could not send full notice");
    }
    let _ = conn.close().await;
}
