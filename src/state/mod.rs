mod answer;
pub mod export;
mod game;
mod player;
pub mod resolve;
mod round;

pub use player::HELLO_SNAPSHOT;

use crate::broadcast::Audience;
use crate::protocol::{Envelope, ServerKind};
use crate::registry::{ConnectionId, OutboxRx, Registry};
use crate::repository::{MemoryRepository, Repository};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, MutexGuard};

/// Frames a connection may have queued before it counts as too slow
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything shared between connection tasks: the entity collections and
/// the live connections. Only ever reached through [`AppState::world`], so
/// each logical operation (mutation plus its fanout) runs under one lock.
pub struct World {
    pub repo: Box<dyn Repository>,
    pub registry: Registry,
}

impl World {
    pub fn new(repo: Box<dyn Repository>) -> Self {
        Self {
            repo,
            registry: Registry::new(),
        }
    }

    /// Drop a connection and tell everyone else its player left.
    pub fn teardown(&mut self, conn: ConnectionId) {
        let Some(removed) = self.registry.unregister(conn) else {
            return;
        };
        let Some(player_id) = removed.player_id else {
            tracing::debug!("{} closed before handshake", conn);
            return;
        };

        match self.repo.players().get(&player_id) {
            Some(player) => match Envelope::json(ServerKind::PlayerDisconnected, &player) {
                Ok(env) => self.notify(&Audience::Authenticated, env),
                Err(e) => tracing::error!("Failed to encode disconnect notice: {}", e),
            },
            None => tracing::debug!("{} was bound to vanished player {}", conn, player_id),
        }
    }
}

/// Shared application state
pub struct AppState {
    world: Mutex<World>,
    outbox_capacity: usize,
    /// Deadline for one socket write before the connection is dropped
    pub write_timeout: Duration,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_repository(Box::new(MemoryRepository::new()))
    }

    pub fn with_repository(repo: Box<dyn Repository>) -> Self {
        Self {
            world: Mutex::new(World::new(repo)),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity.max(1);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Exclusive access to the world for one logical operation
    pub async fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().await
    }

    /// Register a new connection and hand back the receiving end of its outbox
    pub async fn connect(&self) -> (ConnectionId, OutboxRx) {
        let (tx, rx) = mpsc::channel(self.outbox_capacity);
        let id = self.world().await.registry.register(tx);
        tracing::info!("{} registered", id);
        (id, rx)
    }

    pub async fn disconnect(&self, conn: ConnectionId) {
        self.world().await.teardown(conn);
        tracing::info!("{} torn down", conn);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
