//! Dispatch engine: an isolated Tokio task that owns the live set.
//!
//! Registrations, deregistrations and broadcasts all travel through one
//! mpsc channel and are handled strictly one at a time. Announcements an
//! event causes (join, leave, roster) go on an internal FIFO that is
//! drained before the next event is taken, so the processing order is
//! the single source of truth for "what happened when".

use std::collections::{BTreeMap, VecDeque};

use linecast_protocol::ServerLine;
use linecast_session::Session;
use linecast_transport::{Connection, ConnectionId};
use tokio::sync::{mpsc, oneshot};

use crate::{DispatchConfig, DispatchError, Membership};

/// Events sent to the engine through its channel.
///
/// `Register` and `Shutdown` carry a reply channel: the caller submits
/// the event and waits for the engine to report back.
pub(crate) enum Event<C: Connection> {
    /// Admit a session to the room.
    Register {
        session: Session<C>,
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },

    /// Remove a session from the room. No-op for non-members.
    Deregister(ConnectionId),

    /// Deliver a line to every member.
    Broadcast(String),

    /// Say goodbye to every member and stop.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle to the running engine. Used to submit events to it.
///
/// Cheap to clone; the acceptor keeps one and every inbound pump gets
/// its own.
pub struct DispatchHandle<C: Connection> {
    sender: mpsc::UnboundedSender<Event<C>>,
    membership: Membership,
}

impl<C: Connection> Clone for DispatchHandle<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            membership: self.membership.clone(),
        }
    }
}

impl<C: Connection> DispatchHandle<C> {
    /// Read-only view of the live set.
    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Submits a registration and waits until it has been applied and
    /// the resulting join and roster lines have been fanned out.
    ///
    /// # Errors
    /// - [`DispatchError::ServerFull`] — the room was at capacity when the
    ///   engine got to this registration. The session is dropped without
    ///   touching its connection.
    /// - [`DispatchError::Session`] — the session was not awaiting
    ///   admission.
    /// - [`DispatchError::Unavailable`] — the engine has stopped.
    pub async fn register(&self, session: Session<C>) -> Result<(), DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Event::Register {
                session,
                reply: reply_tx,
            })
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)?
    }

    /// Submits a deregistration (fire-and-forget).
    pub fn deregister(&self, id: ConnectionId) -> Result<(), DispatchError> {
        self.sender
            .send(Event::Deregister(id))
            .map_err(|_| DispatchError::Unavailable)
    }

    /// Submits a line for every member (fire-and-forget).
    pub fn broadcast(&self, line: impl Into<String>) -> Result<(), DispatchError> {
        self.sender
            .send(Event::Broadcast(line.into()))
            .map_err(|_| DispatchError::Unavailable)
    }

    /// Tells the engine to notify every member and stop. Returns once it
    /// has done so. Members' queues are closed but not discarded, so
    /// their outbound pumps flush the notice before closing.
    pub async fn shutdown(&self) -> Result<(), DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Event::Shutdown { reply: reply_tx })
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)
    }
}

/// The internal engine state. Runs inside a Tokio task.
struct DispatchEngine<C: Connection> {
    config: DispatchConfig,
    /// The live set. Only this task touches it.
    members: BTreeMap<ConnectionId, Session<C>>,
    /// Mirror of `members` for readers outside the task.
    membership: Membership,
    /// Announcements waiting to be fanned out.
    pending: VecDeque<String>,
    receiver: mpsc::UnboundedReceiver<Event<C>>,
}

impl<C: Connection> DispatchEngine<C> {
    /// Runs the event loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(capacity = self.config.capacity, "dispatch engine started");

        while let Some(event) = self.receiver.recv().await {
            match event {
                Event::Register { session, reply } => {
                    let result = self.handle_register(session).await;
                    self.flush_pending().await;
                    let _ = reply.send(result);
                }
                Event::Deregister(id) => {
                    self.handle_deregister(id).await;
                    self.flush_pending().await;
                }
                Event::Broadcast(line) => {
                    self.fan_out(line).await;
                    self.flush_pending().await;
                }
                Event::Shutdown { reply } => {
                    self.handle_shutdown().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }

        tracing::info!("dispatch engine stopped");
    }

    async fn handle_register(
        &mut self,
        mut session: Session<C>,
    ) -> Result<(), DispatchError> {
        if self.members.len() >= self.config.capacity {
            tracing::debug!(
                id = %session.id(),
                name = session.name(),
                capacity = self.config.capacity,
                "registration refused, room full"
            );
            return Err(DispatchError::ServerFull {
                capacity: self.config.capacity,
            });
        }

        session.activate()?;

        let id = session.id();
        let name = session.name().to_owned();
        self.membership.insert(id, name.clone()).await;
        self.members.insert(id, session);

        tracing::info!(%id, name = %name, members = self.members.len(), "joined");

        self.announce(ServerLine::Joined { name });
        self.announce_roster();
        Ok(())
    }

    async fn handle_deregister(&mut self, id: ConnectionId) {
        let Some(session) = self.members.remove(&id) else {
            tracing::debug!(%id, "deregister for non-member, ignoring");
            return;
        };
        self.membership.remove(id).await;

        let name = session.name().to_owned();
        session.close().await;

        tracing::info!(%id, name = %name, members = self.members.len(), "left");

        self.announce(ServerLine::Left { name });
        self.announce_roster();
    }

    /// Offers `line` to every member without waiting. A member whose
    /// queue is full (or whose pump is gone) is dropped from the room.
    async fn fan_out(&mut self, line: String) {
        let mut laggards = Vec::new();
        for (id, session) in &self.members {
            if let Err(e) = session.try_enqueue(line.clone()) {
                tracing::warn!(
                    %id,
                    name = session.name(),
                    error = %e,
                    "dropping slow client"
                );
                laggards.push(*id);
            }
        }

        for id in laggards {
            self.handle_deregister(id).await;
        }
    }

    /// Fans out queued announcements, including any that fanning out
    /// causes (a laggard's leave line, for example).
    async fn flush_pending(&mut self) {
        while let Some(line) = self.pending.pop_front() {
            self.fan_out(line).await;
        }
    }

    async fn handle_shutdown(&mut self) {
        tracing::info!(members = self.members.len(), "dispatch engine shutting down");

        let notice = ServerLine::Shutdown.to_string();
        for (id, mut session) in std::mem::take(&mut self.members) {
            if let Err(e) = session.try_enqueue(notice.clone()) {
                tracing::debug!(%id, error = %e, "shutdown notice not queued");
            }
            session.detach();
        }
        self.pending.clear();
        self.membership.clear().await;
    }

    fn announce(&mut self, line: ServerLine) {
        self.pending.push_back(line.to_string());
    }

    fn announce_roster(&mut self) {
        let names = self.members.values().map(|s| s.name().to_owned());
        if let Some(line) = ServerLine::roster(names) {
            self.announce(line);
        }
    }
}

/// Spawns the engine task and returns a handle to communicate with it.
///
/// The intake channel is unbounded: submitting never waits, at the cost
/// of letting a burst of events queue up in memory.
pub fn spawn_dispatch<C: Connection>(config: DispatchConfig) -> DispatchHandle<C> {
    let (tx, rx) = mpsc::unbounded_channel();
    let membership = Membership::new();

    let engine = DispatchEngine::<C> {
        config,
        members: BTreeMap::new(),
        membership: membership.clone(),
        pending: VecDeque::new(),
        receiver: rx,
    };

    tokio::spawn(engine.run());

    DispatchHandle {
        sender: tx,
        membership,
    }
}
