use super::World;
use crate::broadcast::{Audience, View};
use crate::error::{SyncError, SyncResult};
use crate::protocol::NextRoundPayload;
use crate::registry::ConnectionId;
use crate::state::resolve::active_round_of;
use crate::types::*;

/// Views republished to a game after it advances
const ADVANCE_VIEWS: &[View] = &[
    View::Rounds,
    View::Round,
    View::Games,
    View::Roster,
    View::Answers,
    View::Text,
];

impl World {
    /// Set the question of the caller's active round
    pub fn set_text(&mut self, conn: ConnectionId, question: String) -> SyncResult<Round> {
        let round = self.active_round_for(conn)?;
        let round = self
            .repo
            .rounds_mut()
            .update(&round.id, &mut |r| r.question = question.clone())
            .ok_or_else(|| SyncError::not_found(format!("round {}", round.id)))?;

        self.publish(&Audience::ActiveIn(round.game_id.clone()), &[View::Text]);
        Ok(round)
    }

    pub fn start_round(&mut self, conn: ConnectionId) -> SyncResult<Round> {
        self.flag_round(conn, |r| {
            r.started = true;
            r.ended = false;
        })
    }

    pub fn end_round(&mut self, conn: ConnectionId) -> SyncResult<Round> {
        self.flag_round(conn, |r| {
            r.started = false;
            r.ended = true;
        })
    }

    fn flag_round(
        &mut self,
        conn: ConnectionId,
        mut apply: impl FnMut(&mut Round),
    ) -> SyncResult<Round> {
        let round = self.active_round_for(conn)?;
        let round = self
            .repo
            .rounds_mut()
            .update(&round.id, &mut apply)
            .ok_or_else(|| SyncError::not_found(format!("round {}", round.id)))?;
        tracing::info!(
            "Round {} of game {}: started={} ended={}",
            round.sequence_number,
            round.game_id,
            round.started,
            round.ended
        );

        self.publish(&Audience::ActiveIn(round.game_id.clone()), &[View::Round]);
        Ok(round)
    }

    /// Retire the active round and open the next one. Moderator only.
    ///
    /// When the request names a round that is no longer the active one, the
    /// game has already advanced past it and nothing changes.
    pub fn go_next_round(
        &mut self,
        conn: ConnectionId,
        request: NextRoundPayload,
    ) -> SyncResult<Option<Round>> {
        let player = self.player_for(conn)?;
        let game = self
            .repo
            .games()
            .get(&request.game_id)
            .ok_or_else(|| SyncError::not_found(format!("game {}", request.game_id)))?;

        if !game.is_moderator(&player.id) {
            return Err(SyncError::Forbidden(format!(
                "{} is not the moderator of game {}",
                player.id, game.id
            )));
        }

        let current = active_round_of(self.repo.as_ref(), &game.id).ok();
        if let Some(expected) = request.round_id.as_deref() {
            if current.as_ref().map(|r| r.id.as_str()) != Some(expected) {
                tracing::warn!(
                    "Ignoring advance of game {} past round {}: not the active round",
                    game.id,
                    expected
                );
                return Ok(None);
            }
        }

        let next_sequence = match &current {
            Some(round) => {
                self.repo.rounds_mut().update(&round.id, &mut |r| r.deactivate());
                round.sequence_number + 1
            }
            None => {
                self.repo
                    .rounds()
                    .find(&|r| r.game_id == game.id)
                    .iter()
                    .map(|r| r.sequence_number)
                    .max()
                    .unwrap_or(0)
                    + 1
            }
        };

        let next = Round::opening(&game.id, next_sequence);
        self.repo.rounds_mut().insert(next.clone());
        tracing::info!("Game {} advanced to round {}", game.id, next_sequence);

        self.publish(&Audience::ActiveIn(game.id.clone()), ADVANCE_VIEWS);
        Ok(Some(next))
    }
}
