//! Identity resolution: connection → player → active game → active round.
//!
//! Nothing here is cached. Every message re-resolves from the repository so a
//! connection holding a stale id simply fails to resolve.

use super::World;
use crate::error::{SyncError, SyncResult};
use crate::registry::ConnectionId;
use crate::repository::Repository;
use crate::types::*;

/// The player bound to a connection. Fails before handshake, or when the
/// bound id no longer exists in the repository.
pub fn resolve_player(world: &World, conn: ConnectionId) -> SyncResult<Player> {
    let player_id = world
        .registry
        .player_of(conn)
        .ok_or_else(|| SyncError::not_found(format!("no player bound to {}", conn)))?;

    world
        .repo
        .players()
        .get(&player_id)
        .ok_or_else(|| SyncError::not_found(format!("player {}", player_id)))
}

/// The single game a player is playing in.
///
/// Joined games are searched first; only when the player has joined none are
/// moderated games considered. Either tier yields exactly one game or fails.
pub fn resolve_active_game(repo: &dyn Repository, player_id: &str) -> SyncResult<Game> {
    let joined = repo.games().find(&|g| g.has_player(player_id));
    if !joined.is_empty() {
        return exactly_one(joined, player_id, "member");
    }

    let moderated = repo.games().find(&|g| g.is_moderator(player_id));
    if moderated.is_empty() {
        return Err(SyncError::not_found(format!(
            "no active game for player {}",
            player_id
        )));
    }
    exactly_one(moderated, player_id, "moderator")
}

fn exactly_one(mut games: Vec<Game>, player_id: &str, tier: &str) -> SyncResult<Game> {
    if games.len() > 1 {
        return Err(SyncError::Ambiguous(format!(
            "player {} is {} of {} games",
            player_id,
            tier,
            games.len()
        )));
    }
    games
        .pop()
        .ok_or_else(|| SyncError::not_found(format!("no active game for player {}", player_id)))
}

/// The active round of a game, if it has one
pub fn active_round_of(repo: &dyn Repository, game_id: &str) -> SyncResult<Round> {
    repo.rounds()
        .find(&|r| r.game_id == game_id && r.active)
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::not_found(format!("no active round in game {}", game_id)))
}

/// The active round of the player's active game
pub fn resolve_active_round(repo: &dyn Repository, player_id: &str) -> SyncResult<Round> {
    let game = resolve_active_game(repo, player_id)?;
    active_round_of(repo, &game.id)
}

impl World {
    pub fn player_for(&self, conn: ConnectionId) -> SyncResult<Player> {
        resolve_player(self, conn)
    }

    pub fn active_game_for(&self, conn: ConnectionId) -> SyncResult<Game> {
        let player = resolve_player(self, conn)?;
        resolve_active_game(self.repo.as_ref(), &player.id)
    }

    pub fn active_round_for(&self, conn: ConnectionId) -> SyncResult<Round> {
        let player = resolve_player(self, conn)?;
        resolve_active_round(self.repo.as_ref(), &player.id)
    }
}
