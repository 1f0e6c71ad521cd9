//! Fanout of full-state views.
//!
//! Every mutation republishes whole views rather than diffs. Each view kind
//! has exactly one render function here, so switching a view to incremental
//! updates only touches that function.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{Envelope, ServerKind};
use crate::registry::{ConnectionId, ConnectionView};
use crate::repository::Repository;
use crate::state::resolve::{active_round_of, resolve_active_game, resolve_active_round};
use crate::state::World;
use crate::types::*;
use std::collections::BTreeSet;

/// A view of shared state, rendered per connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Every game (`get_games`)
    Games,
    /// The connection's active game (`get_game`)
    Game,
    /// All rounds of the active game (`get_rounds`)
    Rounds,
    /// The active round (`get_round`)
    Round,
    /// Question of the active round (`set_text`)
    Text,
    /// Answers of the active round (`all_answers`)
    Answers,
    /// Players connected to the same game (`get_connected_players`)
    Roster,
}

/// Which connections a fanout reaches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connection that completed a handshake
    Authenticated,
    /// Every authenticated connection except the given one
    Others(ConnectionId),
    /// Authenticated connections whose active game is the given one
    ActiveIn(GameId),
    /// Like `ActiveIn`, minus the given connection
    ActiveInExcept(GameId, ConnectionId),
}

impl Audience {
    fn includes(&self, repo: &dyn Repository, conn: &ConnectionView) -> bool {
        let Some(player_id) = conn.player_id.as_deref() else {
            return false;
        };
        match self {
            Self::Authenticated => true,
            Self::Others(skip) => conn.id != *skip,
            Self::ActiveIn(game_id) => in_game(repo, player_id, game_id),
            Self::ActiveInExcept(game_id, skip) => {
                conn.id != *skip && in_game(repo, player_id, game_id)
            }
        }
    }
}

fn in_game(repo: &dyn Repository, player_id: &str, game_id: &str) -> bool {
    resolve_active_game(repo, player_id)
        .map(|g| g.id == game_id)
        .unwrap_or(false)
}

fn bound_player(world: &World, conn: ConnectionId) -> SyncResult<PlayerId> {
    world
        .registry
        .player_of(conn)
        .ok_or_else(|| SyncError::not_found(format!("no player bound to {}", conn)))
}

pub fn render_games(repo: &dyn Repository) -> SyncResult<Envelope> {
    Envelope::json(ServerKind::GetGames, &repo.games().all())
}

pub fn render_game(repo: &dyn Repository, player_id: &str) -> SyncResult<Envelope> {
    let game = resolve_active_game(repo, player_id)?;
    Envelope::json(ServerKind::GetGame, &game)
}

pub fn render_rounds(repo: &dyn Repository, player_id: &str) -> SyncResult<Envelope> {
    let game = resolve_active_game(repo, player_id)?;
    let mut rounds = repo.rounds().find(&|r| r.game_id == game.id);
    rounds.sort_by_key(|r| r.sequence_number);
    Envelope::json(ServerKind::GetRounds, &rounds)
}

pub fn render_round(repo: &dyn Repository, player_id: &str) -> SyncResult<Envelope> {
    let round = resolve_active_round(repo, player_id)?;
    Envelope::json(ServerKind::GetRound, &round)
}

pub fn render_text(repo: &dyn Repository, player_id: &str) -> SyncResult<Envelope> {
    let round = resolve_active_round(repo, player_id)?;
    Ok(Envelope::new(ServerKind::SetText, round.question))
}

pub fn render_answers(repo: &dyn Repository, player_id: &str) -> SyncResult<Envelope> {
    let game = resolve_active_game(repo, player_id)?;
    let round = active_round_of(repo, &game.id)?;
    let answers = repo
        .answers()
        .find(&|a| a.game_id == game.id && a.round_id == round.id);
    Envelope::json(ServerKind::AllAnswers, &answers)
}

/// Distinct players on live connections sharing the caller's active game
pub fn render_roster(world: &World, player_id: &str) -> SyncResult<Envelope> {
    let repo = world.repo.as_ref();
    let game = resolve_active_game(repo, player_id)?;

    let mut seen = BTreeSet::new();
    let mut players = Vec::new();
    for conn in world.registry.snapshot() {
        let Some(pid) = conn.player_id else { continue };
        if seen.contains(&pid) || !in_game(repo, &pid, &game.id) {
            continue;
        }
        if let Some(player) = repo.players().get(&pid) {
            players.push(player);
        }
        seen.insert(pid);
    }
    Envelope::json(ServerKind::GetConnectedPlayers, &players)
}

impl World {
    /// Render one view as seen by one connection
    pub fn render(&self, view: View, conn: ConnectionId) -> SyncResult<Envelope> {
        let repo = self.repo.as_ref();
        match view {
            View::Games => render_games(repo),
            View::Game => render_game(repo, &bound_player(self, conn)?),
            View::Rounds => render_rounds(repo, &bound_player(self, conn)?),
            View::Round => render_round(repo, &bound_player(self, conn)?),
            View::Text => render_text(repo, &bound_player(self, conn)?),
            View::Answers => render_answers(repo, &bound_player(self, conn)?),
            View::Roster => render_roster(self, &bound_player(self, conn)?),
        }
    }

    /// Send a frame to one connection
    pub fn reply(&mut self, conn: ConnectionId, envelope: Envelope) {
        self.registry.send(conn, envelope);
    }

    /// Render a view for the caller and send it, propagating render failures
    pub fn reply_view(&mut self, conn: ConnectionId, view: View) -> SyncResult<()> {
        let env = self.render(view, conn)?;
        self.reply(conn, env);
        Ok(())
    }

    /// Send the same frame to every connection in the audience
    pub fn notify(&mut self, audience: &Audience, envelope: Envelope) {
        let targets = self.targets(audience);
        tracing::debug!("Notifying {} connections: {}", targets.len(), envelope.kind);
        for conn in targets {
            self.registry.send(conn, envelope.clone());
        }
    }

    /// Re-render each view for every connection in the audience and push it.
    /// A connection that cannot resolve a view (no active game, no active
    /// round) just doesn't get that view.
    pub fn publish(&mut self, audience: &Audience, views: &[View]) {
        let targets = self.targets(audience);
        tracing::debug!("Publishing {:?} to {} connections", views, targets.len());
        for conn in targets {
            self.publish_to(conn, views);
        }
    }

    /// Best-effort push of several views to a single connection
    pub fn publish_to(&mut self, conn: ConnectionId, views: &[View]) {
        for view in views {
            match self.render(*view, conn) {
                Ok(env) => {
                    self.registry.send(conn, env);
                }
                Err(e) => tracing::debug!("Skipping {:?} for {}: {}", view, conn, e),
            }
        }
    }

    fn targets(&self, audience: &Audience) -> Vec<ConnectionId> {
        let repo = self.repo.as_ref();
        self.registry
            .snapshot()
            .into_iter()
            .filter(|c| audience.includes(repo, c))
            .map(|c| c.id)
            .collect()
    }
}
