//! Registry of live connections.
//!
//! Each entry owns the sending half of its connection's outbox. The socket
//! itself belongs to the connection's writer task; the registry only ever
//! enqueues, so it can be walked while the state lock is held.

use crate::protocol::Envelope;
use crate::types::PlayerId;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifier for a live connection, unique over the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

pub type Outbox = mpsc::Sender<Envelope>;
pub type OutboxRx = mpsc::Receiver<Envelope>;

#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Unset until a successful handshake
    pub player_id: Option<PlayerId>,
    /// `None` once the connection has been dropped for not keeping up
    outbox: Option<Outbox>,
}

impl Connection {
    pub fn is_authenticated(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn is_live(&self) -> bool {
        self.outbox.is_some()
    }
}

/// Point-in-time copy of one registry entry, safe to hold across mutations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionView {
    pub id: ConnectionId,
    pub player_id: Option<PlayerId>,
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, outbox: Outbox) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connections.insert(
            id,
            Connection {
                id,
                player_id: None,
                outbox: Some(outbox),
            },
        );
        id
    }

    /// Remove a connection. Dropping the entry closes its outbox, which lets
    /// the writer task drain what is queued and shut the socket.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn bind(&mut self, id: ConnectionId, player_id: PlayerId) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) => {
                conn.player_id = Some(player_id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn player_of(&self, id: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&id).and_then(|c| c.player_id.clone())
    }

    pub fn for_each(&self, mut f: impl FnMut(&Connection)) {
        for conn in self.connections.values().filter(|c| c.is_live()) {
            f(conn);
        }
    }

    /// Copy of every live entry, ordered by id
    pub fn snapshot(&self) -> Vec<ConnectionView> {
        let mut views = Vec::with_capacity(self.connections.len());
        self.for_each(|c| {
            views.push(ConnectionView {
                id: c.id,
                player_id: c.player_id.clone(),
            })
        });
        views.sort_by_key(|v| v.id);
        views
    }

    /// Enqueue a frame without waiting. A connection whose outbox is full or
    /// closed is cut off: it stops receiving fanout and its writer winds down.
    pub fn send(&mut self, id: ConnectionId, envelope: Envelope) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            return false;
        };
        let Some(outbox) = conn.outbox.as_ref() else {
            return false;
        };

        match outbox.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(env)) => {
                tracing::warn!(
                    "{} is not keeping up (dropped {}), disconnecting",
                    id,
                    env.kind
                );
                conn.outbox = None;
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("{} outbox already closed", id);
                conn.outbox = None;
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
