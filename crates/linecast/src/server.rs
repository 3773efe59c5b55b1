//! `LinecastServer` builder and accept loop.
//!
//! This is the entry point for running a Linecast relay. It ties the
//! layers together: transport → session handshake → dispatch engine.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use linecast_dispatch::{DispatchConfig, Membership, spawn_dispatch};
use linecast_session::SessionConfig;
use linecast_transport::{TcpTransport, Transport};
use tokio::task::JoinSet;

use crate::LinecastError;
use crate::handler::{ServerState, handle_connection};

/// Port the relay listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8888;

/// Builder for configuring and starting a Linecast server.
///
/// # Example
///
/// ```rust,ignore
/// use linecast::prelude::*;
///
/// let server = LinecastServer::builder()
///     .port(9000)
///     .max_sessions(100)
///     .build()
///     .await?;
/// server.run_until_ctrl_c().await
/// ```
pub struct LinecastServerBuilder {
    bind_addr: String,
    max_sessions: usize,
    session_config: SessionConfig,
    shutdown_grace: Duration,
}

impl LinecastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_sessions: DispatchConfig::default().capacity,
            session_config: SessionConfig::default(),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Sets the full address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Keeps the bind host and replaces the port.
    pub fn port(mut self, port: u16) -> Self {
        let host = self
            .bind_addr
            .rsplit_once(':')
            .map_or("0.0.0.0", |(host, _)| host);
        self.bind_addr = format!("{host}:{port}");
        self
    }

    /// Sets how many clients may be in the room at once.
    pub fn max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Sets the per-session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets how long shutdown waits for clients to receive the final
    /// notice before their connections are dropped.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Binds the listener and starts the dispatch engine.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn build(self) -> Result<LinecastServer, LinecastError> {
        let transport = TcpTransport::bind(&self.bind_addr)
            .await?
            .with_max_line_len(self.session_config.max_line_len);

        let dispatch = spawn_dispatch(DispatchConfig {
            capacity: self.max_sessions,
        });

        let state = Arc::new(ServerState {
            dispatch,
            session_config: self.session_config,
            max_sessions: self.max_sessions,
        });

        Ok(LinecastServer {
            transport,
            state,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

impl Default for LinecastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Linecast server.
///
/// Call [`run()`](Self::run) or one of its variants to start accepting
/// connections.
pub struct LinecastServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
    shutdown_grace: Duration,
}

impl LinecastServer {
    /// Creates a new builder.
    pub fn builder() -> LinecastServerBuilder {
        LinecastServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Read-only view of who is in the room.
    pub fn membership(&self) -> Membership {
        self.state.dispatch.membership().clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), LinecastError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> Result<(), LinecastError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted connection is handled on its own task. On shutdown
    /// the server stops accepting, has the dispatch engine send every
    /// client a final notice, and waits up to the configured grace
    /// period for those notices to be flushed. Connections still open
    /// after that are aborted, and their sockets closed, before this
    /// returns.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), LinecastError>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(
            addr = ?self.local_addr().ok(),
            max_sessions = self.state.max_sessions,
            "Linecast server running"
        );

        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!(connections = connections.len(), "shutting down");
        self.transport.shutdown().await?;
        if let Err(e) = self.state.dispatch.shutdown().await {
            tracing::debug!(error = %e, "dispatch engine already stopped");
        }

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "shutdown grace elapsed, dropping connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        tracing::info!("Linecast server stopped");
        Ok(())
    }
}
