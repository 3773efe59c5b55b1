//! Read-only view of the live membership set.
//!
//! The dispatch engine is the only writer. Everyone else (the acceptor's
//! capacity check, roster queries) gets a cloned [`Membership`] and reads
//! through the shared lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use linecast_transport::ConnectionId;
use tokio::sync::RwLock;

/// Who is in the room right now, keyed by connection and ordered by
/// accept sequence.
///
/// Cheap to clone; every clone sees the same set.
#[derive(Debug, Clone, Default)]
pub struct Membership {
    members: Arc<RwLock<BTreeMap<ConnectionId, String>>>,
}

impl Membership {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of active members.
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    /// Returns `true` if nobody is in the room.
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Display names of all members, in join order.
    pub async fn names(&self) -> Vec<String> {
        self.members.read().await.values().cloned().collect()
    }

    /// Returns `true` if `id` is an active member.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    pub(crate) async fn insert(&self, id: ConnectionId, name: String) {
        self.members.write().await.insert(id, name);
    }

    pub(crate) async fn remove(&self, id: ConnectionId) {
        self.members.write().await.remove(&id);
    }

    pub(crate) async fn clear(&self) {
        self.members.write().await.clear();
    }
}
