use super::World;
use crate::broadcast::{Audience, View};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{Envelope, ServerKind, JOIN_REJECTED};
use crate::registry::ConnectionId;
use crate::types::*;

/// Views a member needs whenever the shape of its game changes
pub const GAME_VIEWS: &[View] = &[
    View::Rounds,
    View::Round,
    View::Roster,
    View::Answers,
    View::Text,
];

impl World {
    /// Mint a game with `moderator_id` as moderator, plus its opening round
    pub fn open_game(&mut self, name: String, moderator_id: &str) -> Game {
        let game = Game {
            id: new_id(),
            name,
            moderator_id: moderator_id.to_string(),
            players: Vec::new(),
        };
        self.repo.games_mut().insert(game.clone());
        self.repo.rounds_mut().insert(Round::opening(&game.id, 1));
        tracing::info!("Game {} ({}) opened by {}", game.name, game.id, moderator_id);
        game
    }

    pub fn create_game(&mut self, conn: ConnectionId, name: String) -> SyncResult<Game> {
        let player = self.player_for(conn)?;
        let game = self.open_game(name, &player.id);

        self.reply(conn, Envelope::json(ServerKind::CreateGame, &game)?);
        self.publish(&Audience::Authenticated, &[View::Games]);
        self.publish(&Audience::ActiveIn(game.id.clone()), GAME_VIEWS);
        Ok(game)
    }

    /// Game creation from the HTTP surface, where there is no calling connection
    pub fn create_game_detached(&mut self, name: String, moderator_id: &str) -> Game {
        let game = self.open_game(name, moderator_id);
        self.publish(&Audience::Authenticated, &[View::Games]);
        self.publish(&Audience::ActiveIn(game.id.clone()), GAME_VIEWS);
        game
    }

    /// Add the caller to a game. An unknown game id is answered with
    /// `join_game "false"` and is not an error.
    pub fn join_game(&mut self, conn: ConnectionId, game_id: &str) -> SyncResult<()> {
        let player = self.player_for(conn)?;

        let joined = self.repo.games_mut().update(game_id, &mut |g| {
            if !g.has_player(&player.id) {
                g.players.push(player.id.clone());
            }
        });
        let Some(game) = joined else {
            tracing::info!("{} tried to join unknown game {}", player.nickname, game_id);
            self.reply(conn, Envelope::new(ServerKind::JoinGame, JOIN_REJECTED));
            return Ok(());
        };
        tracing::info!("{} joined game {}", player.nickname, game.id);

        self.reply(conn, Envelope::json(ServerKind::JoinGame, &game)?);
        self.notify(
            &Audience::ActiveInExcept(game.id.clone(), conn),
            Envelope::json(ServerKind::PlayerConnected, &player)?,
        );
        self.reply_view(conn, View::Answers)
    }

    /// Remove the caller from a game. Only the first matching entry goes.
    pub fn leave_game(&mut self, conn: ConnectionId, game_id: &str) -> SyncResult<()> {
        let player = self.player_for(conn)?;

        let left = self.repo.games_mut().update(game_id, &mut |g| {
            if let Some(pos) = g.players.iter().position(|p| *p == player.id) {
                g.players.remove(pos);
            }
        });
        if left.is_none() {
            tracing::info!("{} tried to leave unknown game {}", player.nickname, game_id);
            return Ok(());
        }
        tracing::info!("{} left game {}", player.nickname, game_id);

        self.notify(
            &Audience::Others(conn),
            Envelope::new(ServerKind::LeaveGame, player.id.clone()),
        );
        self.reply_view(conn, View::Games)
    }

    /// Delete a game with its rounds and answers. Moderator only.
    pub fn delete_game(&mut self, conn: ConnectionId, game_id: &str) -> SyncResult<()> {
        let player = self.player_for(conn)?;
        let game = self
            .repo
            .games()
            .get(game_id)
            .ok_or_else(|| SyncError::not_found(format!("game {}", game_id)))?;

        if !game.is_moderator(&player.id) {
            return Err(SyncError::Forbidden(format!(
                "{} is not the moderator of game {}",
                player.id, game.id
            )));
        }

        self.repo.delete_game_cascade(&game.id);
        tracing::info!("Game {} deleted by {}", game.id, player.nickname);

        self.notify(
            &Audience::Authenticated,
            Envelope::new(ServerKind::GameDeleted, game.id),
        );
        self.publish(&Audience::Authenticated, &[View::Games]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HelloPayload;
    use crate::registry::OutboxRx;
    use crate::repository::MemoryRepository;
    use crate::state::resolve::resolve_active_game;

    fn attach(world: &mut World, name: &str) -> (ConnectionId, OutboxRx, Player) {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let conn = world.registry.register(tx);
        let player = world
            .say_hello(
                conn,
                HelloPayload {
                    name: name.to_string(),
                    uuid: None,
                },
            )
            .unwrap();
        while rx.try_recv().is_ok() {}
        (conn, rx, player)
    }

    fn kinds(rx: &mut OutboxRx) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(env) = rx.try_recv() {
            out.push(env.kind);
        }
        out
    }

    #[test]
    fn test_create_game_opens_first_round() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (m, mut rx_m, moderator) = attach(&mut world, "Mod");

        let game = world.create_game(m, "Pub Quiz".to_string()).unwrap();

        assert_eq!(game.moderator_id, moderator.id);
        assert!(game.players.is_empty());
        let rounds = world.repo.rounds().find(&|r| r.game_id == game.id);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].sequence_number, 1);
        assert!(rounds[0].active);

        let sent = kinds(&mut rx_m);
        assert_eq!(sent[0], "create_game");
        assert!(sent.contains(&"get_games".to_string()));
        // moderator resolves its game through the fallback tier
        assert!(sent.contains(&"get_round".to_string()));
    }

    #[test]
    fn test_create_game_requires_handshake() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let conn = world.registry.register(tx);

        let err = world.create_game(conn, "Nope".to_string()).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert!(world.repo.games().all().is_empty());
    }

    #[test]
    fn test_join_is_deduplicated() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (m, _rx_m, _) = attach(&mut world, "Mod");
        let (p, _rx_p, player) = attach(&mut world, "Pat");
        let game = world.create_game(m, "Quiz".to_string()).unwrap();

        world.join_game(p, &game.id).unwrap();
        world.join_game(p, &game.id).unwrap();

        let stored = world.repo.games().get(&game.id).unwrap();
        assert_eq!(stored.players, vec![player.id]);
    }

    #[test]
    fn test_join_unknown_game_replies_false() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (p, mut rx_p, _) = attach(&mut world, "Pat");

        world.join_game(p, "missing").unwrap();

        let env = rx_p.try_recv().unwrap();
        assert_eq!(env.kind, "join_game");
        assert_eq!(env.payload, "false");
    }

    #[test]
    fn test_join_announces_to_game_only() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (m, mut rx_m, _) = attach(&mut world, "Mod");
        let (p, mut rx_p, _) = attach(&mut world, "Pat");
        let (_o, mut rx_o, _) = attach(&mut world, "Outsider");
        let game = world.create_game(m, "Quiz".to_string()).unwrap();
        kinds(&mut rx_m);
        kinds(&mut rx_p);
        kinds(&mut rx_o);

        world.join_game(p, &game.id).unwrap();

        assert_eq!(kinds(&mut rx_m), vec!["player_connected"]);
        assert_eq!(kinds(&mut rx_p), vec!["join_game", "all_answers"]);
        assert!(kinds(&mut rx_o).is_empty());
    }

    #[test]
    fn test_leave_removes_first_entry_only() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (p, mut rx_p, player) = attach(&mut world, "Pat");
        let game = world.open_game("Quiz".to_string(), "m");
        world.repo.games_mut().update(&game.id, &mut |g| {
            g.players = vec![player.id.clone(), player.id.clone()];
        });

        world.leave_game(p, &game.id).unwrap();
        assert_eq!(world.repo.games().get(&game.id).unwrap().players.len(), 1);
        assert_eq!(kinds(&mut rx_p), vec!["get_games"]);

        world.leave_game(p, &game.id).unwrap();
        assert!(world.repo.games().get(&game.id).unwrap().players.is_empty());
    }

    #[test]
    fn test_leave_notifies_others() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (p, _rx_p, player) = attach(&mut world, "Pat");
        let (_q, mut rx_q, _) = attach(&mut world, "Quinn");
        let game = world.open_game("Quiz".to_string(), "m");
        world.join_game(p, &game.id).unwrap();
        kinds(&mut rx_q);

        world.leave_game(p, &game.id).unwrap();

        let env = rx_q.try_recv().unwrap();
        assert_eq!(env.kind, "leave_game");
        assert_eq!(env.payload, player.id);
    }

    #[test]
    fn test_delete_game_cascades_and_frees_players() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (m, _rx_m, _) = attach(&mut world, "Mod");
        let (p, mut rx_p, player) = attach(&mut world, "Pat");
        let game = world.create_game(m, "Quiz".to_string()).unwrap();
        world.join_game(p, &game.id).unwrap();
        world.set_answer(p, "Paris".to_string()).unwrap();
        kinds(&mut rx_p);

        world.delete_game(m, &game.id).unwrap();

        assert!(world.repo.games().get(&game.id).is_none());
        assert!(world.repo.rounds().find(&|r| r.game_id == game.id).is_empty());
        assert!(world.repo.answers().find(&|a| a.game_id == game.id).is_empty());
        assert!(matches!(
            resolve_active_game(world.repo.as_ref(), &player.id),
            Err(SyncError::NotFound(_))
        ));
        assert_eq!(kinds(&mut rx_p), vec!["game_deleted", "get_games"]);
    }

    #[test]
    fn test_delete_game_falls_through_to_other_game() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (m, _rx_m, moderator) = attach(&mut world, "Mod");
        let first = world.create_game(m, "First".to_string()).unwrap();
        let second = world.open_game("Second".to_string(), "someone");
        world.repo.games_mut().update(&second.id, &mut |g| {
            g.players.push(moderator.id.clone());
        });
        // membership of `second` shadows moderation of `first`
        assert_eq!(world.active_game_for(m).unwrap().id, second.id);

        world.delete_game(m, &first.id).unwrap();
        let active = resolve_active_game(world.repo.as_ref(), &moderator.id).unwrap();
        assert_eq!(active.id, second.id);
    }

    #[test]
    fn test_delete_game_forbidden_for_non_moderator() {
        let mut world = World::new(Box::new(MemoryRepository::new()));
        let (m, _rx_m, _) = attach(&mut world, "Mod");
        let (p, _rx_p, _) = attach(&mut world, "Pat");
        let game = world.create_game(m, "Quiz".to_string()).unwrap();

        let err = world.delete_game(p, &game.id).unwrap_err();
        assert!(matches!(err, SyncError::Forbidden(_)));
        assert!(world.repo.games().get(&game.id).is_some());
    }
}
