use super::World;
use crate::broadcast::{Audience, View};
use crate::error::SyncResult;
use crate::protocol::{Envelope, HelloPayload, ServerKind};
use crate::registry::ConnectionId;
use crate::types::*;

/// Everything a client needs to rebuild its screen after a handshake
pub const HELLO_SNAPSHOT: &[View] = &[
    View::Games,
    View::Roster,
    View::Rounds,
    View::Round,
    View::Text,
    View::Game,
    View::Answers,
];

impl World {
    /// Bind a connection to a player identity.
    ///
    /// A known id is re-bound and renamed. No id, or an id that no longer
    /// resolves, mints a fresh player and tells the client its new id, so a
    /// client replaying a stale id always ends up authenticated.
    pub fn say_hello(&mut self, conn: ConnectionId, hello: HelloPayload) -> SyncResult<Player> {
        if let Some(known_id) = hello.known_id() {
            let renamed = self
                .repo
                .players_mut()
                .update(known_id, &mut |p| p.nickname = hello.name.clone());

            match renamed {
                Some(player) => {
                    self.registry.bind(conn, player.id.clone());
                    tracing::info!("{} resumed as {} ({})", conn, player.nickname, player.id);
                    self.announce_arrival(conn, &player)?;
                    return Ok(player);
                }
                None => tracing::warn!(
                    "{} presented unknown player id {}, issuing a new one",
                    conn,
                    known_id
                ),
            }
        }

        let player = Player {
            id: new_id(),
            nickname: hello.name,
        };
        self.repo.players_mut().insert(player.clone());
        self.registry.bind(conn, player.id.clone());
        self.reply(conn, Envelope::new(ServerKind::SetUuid, player.id.clone()));
        tracing::info!("{} is new player {} ({})", conn, player.nickname, player.id);

        self.announce_arrival(conn, &player)?;
        Ok(player)
    }

    /// Arrival is only announced into a game context: a player that is a
    /// member of exactly one game. Bare reconnects stay quiet.
    fn announce_arrival(&mut self, conn: ConnectionId, player: &Player) -> SyncResult<()> {
        let memberships = self.repo.games().find(&|g| g.has_player(&player.id)).len();
        if memberships != 1 {
            tracing::debug!(
                "Not announcing {}: member of {} games",
                player.id,
                memberships
            );
            return Ok(());
        }

        let env = Envelope::json(ServerKind::PlayerConnected, player)?;
        self.notify(&Audience::Others(conn), env);
        Ok(())
    }

    /// Push the post-handshake snapshot to the caller. Views that cannot be
    /// resolved yet (no game, no round) are skipped.
    pub fn hello_snapshot(&mut self, conn: ConnectionId) {
        self.publish_to(conn, HELLO_SNAPSHOT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OutboxRx;
    use crate::repository::MemoryRepository;

    fn hello(name: &str, uuid: Option<&str>) -> HelloPayload {
        HelloPayload {
            name: name.to_string(),
            uuid: uuid.map(|s| s.to_string()),
        }
    }

    fn attach(world: &mut World) -> (ConnectionId, OutboxRx) {
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        (world.registry.register(tx), rx)
    }

    fn drain(rx: &mut OutboxRx) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(env) = rx.try_recv() {
            out.push(env);
        }
        out
    }

    #[test]
    fn test_fresh_hello_issues_uuid_quietly() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (a, mut rx_a) = attach(&mut world);
        let (b, mut rx_b) = attach(&mut world);
        world.say_hello(b, hello("Bob", None)).unwrap();
        drain(&mut rx_b);

        let alice = world.say_hello(a, hello("Alice", Some(""))).unwrap();

        let sent = drain(&mut rx_a);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, "set_uuid");
        assert_eq!(sent[0].payload, alice.id);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(world.registry.player_of(a), Some(alice.id));
    }

    #[test]
    fn test_known_id_rebinds_and_renames() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (a, _rx_a) = attach(&mut world);
        let (b, mut rx_b) = attach(&mut world);
        let alice = world.say_hello(a, hello("Alice", None)).unwrap();

        let again = world.say_hello(b, hello("Alice2", Some(&alice.id))).unwrap();

        assert_eq!(again.id, alice.id);
        assert_eq!(again.nickname, "Alice2");
        // no new id for a resumed identity
        assert!(drain(&mut rx_b).is_empty());
        // both connections stay registered against the same player
        assert_eq!(world.registry.player_of(a), Some(alice.id.clone()));
        assert_eq!(world.registry.player_of(b), Some(alice.id));
    }

    #[test]
    fn test_stale_id_mints_new_identity() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (a, mut rx_a) = attach(&mut world);

        let player = world.say_hello(a, hello("Carol", Some("gone"))).unwrap();

        assert_ne!(player.id, "gone");
        let sent = drain(&mut rx_a);
        assert_eq!(sent[0].kind, "set_uuid");
        assert_eq!(sent[0].payload, player.id);
    }

    #[test]
    fn test_resume_announced_only_with_single_game() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (a, _rx_a) = attach(&mut world);
        let (watcher, mut rx_w) = attach(&mut world);
        let alice = world.say_hello(a, hello("Alice", None)).unwrap();
        world.say_hello(watcher, hello("Watcher", None)).unwrap();
        drain(&mut rx_w);

        world.repo.games_mut().insert(Game {
            id: "g1".to_string(),
            name: "One".to_string(),
            moderator_id: "m".to_string(),
            players: vec![alice.id.clone()],
        });
        world.say_hello(a, hello("Alice", Some(&alice.id))).unwrap();
        let sent = drain(&mut rx_w);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, "player_connected");

        world.repo.games_mut().insert(Game {
            id: "g2".to_string(),
            name: "Two".to_string(),
            moderator_id: "m".to_string(),
            players: vec![alice.id.clone()],
        });
        world.say_hello(a, hello("Alice", Some(&alice.id))).unwrap();
        assert!(drain(&mut rx_w).is_empty());
    }
}
