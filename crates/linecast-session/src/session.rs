//! Session types: the data structures that represent one participant.
//!
//! A "session" is the server's record of an admitted client. It tracks:
//! - WHO the client is (`ConnectionId` plus a display name)
//! - WHAT phase it's in (connecting, handshaking, active, disconnected)
//! - WHERE its outbound lines go (a bounded queue drained by its
//!   outbound pump)

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use linecast_transport::{Connection, ConnectionId, DEFAULT_MAX_LINE_LEN};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// `#[derive(Clone)]` is needed because the config is shared: the
/// acceptor keeps one copy and every connection task gets its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lines that may wait in one client's outbound queue. A client that
    /// falls this far behind is dropped.
    ///
    /// Default: 256.
    pub queue_capacity: usize,

    /// Shortest accepted username, in characters. Default: 2.
    pub min_name_len: usize,

    /// Longest accepted username, in characters. Default: 32.
    pub max_name_len: usize,

    /// Longest line, in bytes, a client may send. A longer line ends the
    /// session. Default: 4096.
    pub max_line_len: usize,

    /// How long a new connection may take to answer the username prompt.
    /// `None` waits indefinitely.
    pub handshake_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            min_name_len: 2,
            max_name_len: 32,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            handshake_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle phase of a session.
///
/// Transitions are strictly ordered, and `Disconnected` is terminal:
///
/// ```text
/// Connecting → AwaitingHandshake → Active → Disconnected
/// ```
///
/// Only `Active` sessions are members of the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Connecting,
    AwaitingHandshake,
    Active,
    Disconnected,
}

impl SessionState {
    /// Returns `true` if a session in this phase receives broadcasts.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns the phase that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::AwaitingHandshake),
            Self::AwaitingHandshake => Some(Self::Active),
            Self::Active => Some(Self::Disconnected),
            Self::Disconnected => None,
        }
    }

    /// Returns `true` if moving to `target` is a legal step.
    ///
    /// A session that never made it to `Active` may still be torn down,
    /// so `Disconnected` is reachable from every live phase.
    pub fn can_transition_to(self, target: Self) -> bool {
        match target {
            Self::Disconnected => self != Self::Disconnected,
            _ => self.next() == Some(target),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::AwaitingHandshake => write!(f, "AwaitingHandshake"),
            Self::Active => write!(f, "Active"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One participant that has answered the username prompt.
///
/// A session is created in `AwaitingHandshake` (named, but not admitted
/// yet). The dispatch engine takes ownership on registration, moves it to
/// `Active`, and is the only writer of its queue from then on. Releasing
/// the session drops the queue's sender, which is how the outbound pump
/// learns it should stop.
pub struct Session<C: Connection> {
    id: ConnectionId,
    name: String,
    state: SessionState,
    outbound: Option<mpsc::Sender<String>>,
    conn: Arc<C>,
}

/// The receiving end of a session's outbound queue, owned by its
/// outbound pump.
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::Receiver<String>,
}

impl OutboundQueue {
    /// Waits for the next queued line. Returns `None` once the session
    /// has been released and everything queued before that was taken.
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

impl<C: Connection> Session<C> {
    /// Creates a session for `conn` with a fresh bounded queue.
    ///
    /// # Panics
    /// Panics if `config.queue_capacity` is zero, as `tokio::sync::mpsc`
    /// does.
    pub fn new(
        conn: Arc<C>,
        name: String,
        config: &SessionConfig,
    ) -> (Self, OutboundQueue) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let session = Self {
            id: conn.id(),
            name,
            state: SessionState::AwaitingHandshake,
            outbound: Some(sender),
            conn,
        };
        (session, OutboundQueue { receiver })
    }

    /// Returns the session's identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the display name chosen during the handshake.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current lifecycle phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the connection this session owns.
    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Queues `line` without waiting.
    ///
    /// # Errors
    /// - [`SessionError::QueueFull`] — the outbound pump is behind by a
    ///   whole queue
    /// - [`SessionError::QueueClosed`] — the pump is gone, or the session
    ///   was already released
    pub fn try_enqueue(&self, line: String) -> Result<(), SessionError> {
        let sender = self
            .outbound
            .as_ref()
            .ok_or(SessionError::QueueClosed(self.id))?;
        sender.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::QueueFull(self.id),
            TrySendError::Closed(_) => SessionError::QueueClosed(self.id),
        })
    }

    /// Moves the session to `Active`. Happens once, on registration.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// in `AwaitingHandshake`.
    pub fn activate(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Active)
    }

    /// Moves the session to `Disconnected` and drops its queue sender.
    /// The connection stays open so the outbound pump can flush what was
    /// already queued; the pump closes it when it finishes.
    pub fn detach(&mut self) {
        self.state = SessionState::Disconnected;
        self.outbound = None;
    }

    /// Detaches the session and closes its connection immediately.
    /// Lines still queued are discarded.
    pub async fn close(mut self) {
        self.detach();
        if let Err(e) = self.conn.close().await {
            tracing::debug!(id = %self.id, error = %e, "close failed");
        }
    }

    fn transition(&mut self, target: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(target) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        Ok(())
    }
}

impl<C: Connection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use linecast_transport::TransportError;

    use super::*;

    /// A connection that only records whether it was closed.
    struct StubConnection {
        id: ConnectionId,
        closed: AtomicBool,
        close_calls: AtomicUsize,
    }

    impl StubConnection {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(id),
                closed: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
            })
        }
    }

    impl Connection for StubConnection {
        type Error = TransportError;

        async fn send(&self, _data: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        async fn recv_line(&self) -> Result<Option<Vec<u8>>, TransportError> {
            Ok(None)
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn id(&self) -> ConnectionId {
            self.id
        }
    }

    fn small_config(capacity: usize) -> SessionConfig {
        SessionConfig {
            queue_capacity: capacity,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_state_next_follows_strict_order() {
        assert_eq!(
            SessionState::Connecting.next(),
            Some(SessionState::AwaitingHandshake)
        );
        assert_eq!(
            SessionState::AwaitingHandshake.next(),
            Some(SessionState::Active)
        );
        assert_eq!(
            SessionState::Active.next(),
            Some(SessionState::Disconnected)
        );
        assert_eq!(SessionState::Disconnected.next(), None);
    }

    #[test]
    fn test_state_can_transition_to() {
        assert!(SessionState::AwaitingHandshake
            .can_transition_to(SessionState::Active));
        assert!(!SessionState::Connecting.can_transition_to(SessionState::Active));
        assert!(!SessionState::Disconnected
            .can_transition_to(SessionState::Active));
        assert!(SessionState::Connecting
            .can_transition_to(SessionState::Disconnected));
        assert!(!SessionState::Disconnected
            .can_transition_to(SessionState::Disconnected));
    }

    #[test]
    fn test_only_active_is_live() {
        assert!(!SessionState::Connecting.is_live());
        assert!(!SessionState::AwaitingHandshake.is_live());
        assert!(SessionState::Active.is_live());
        assert!(!SessionState::Disconnected.is_live());
    }

    #[test]
    fn test_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.min_name_len, 2);
        assert_eq!(config.max_name_len, 32);
        assert_eq!(config.max_line_len, 4096);
        assert!(config.handshake_timeout.is_none());
    }

    #[test]
    fn test_new_session_awaits_admission() {
        let conn = StubConnection::new(9);
        let (session, _queue) =
            Session::new(conn, "al".into(), &SessionConfig::default());
        assert_eq!(session.id(), ConnectionId::new(9));
        assert_eq!(session.name(), "al");
        assert_eq!(session.state(), SessionState::AwaitingHandshake);
    }

    #[test]
    fn test_activate_happens_once() {
        let (mut session, _queue) = Session::new(
            StubConnection::new(1),
            "al".into(),
            &SessionConfig::default(),
        );
        session.activate().expect("first activation");
        assert_eq!(session.state(), SessionState::Active);
        assert!(matches!(
            session.activate(),
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_enqueue_is_fifo() {
        let (session, mut queue) =
            Session::new(StubConnection::new(1), "al".into(), &small_config(4));
        session.try_enqueue("one".into()).unwrap();
        session.try_enqueue("two".into()).unwrap();
        assert_eq!(queue.next().await.as_deref(), Some("one"));
        assert_eq!(queue.next().await.as_deref(), Some("two"));
    }

    #[test]
    fn test_enqueue_reports_full_queue() {
        let (session, _queue) =
            Session::new(StubConnection::new(1), "al".into(), &small_config(2));
        session.try_enqueue("a".into()).unwrap();
        session.try_enqueue("b".into()).unwrap();
        assert!(matches!(
            session.try_enqueue("c".into()),
            Err(SessionError::QueueFull(_))
        ));
    }

    #[test]
    fn test_enqueue_reports_closed_queue() {
        let (session, queue) =
            Session::new(StubConnection::new(1), "al".into(), &small_config(2));
        drop(queue);
        assert!(matches!(
            session.try_enqueue("a".into()),
            Err(SessionError::QueueClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_detach_lets_pump_drain_then_end() {
        let conn = StubConnection::new(1);
        let (mut session, mut queue) =
            Session::new(Arc::clone(&conn), "al".into(), &small_config(4));
        session.try_enqueue("last words".into()).unwrap();
        session.detach();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!conn.is_closed());
        assert_eq!(queue.next().await.as_deref(), Some("last words"));
        assert_eq!(queue.next().await, None);
    }

    #[tokio::test]
    async fn test_close_releases_queue_and_connection() {
        let conn = StubConnection::new(1);
        let (session, mut queue) =
            Session::new(Arc::clone(&conn), "al".into(), &small_config(4));
        session.close().await;

        assert!(conn.is_closed());
        assert_eq!(conn.close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.next().await, None);
    }
}
