use super::World;
use crate::broadcast::{Audience, View};
use crate::error::{SyncError, SyncResult};
use crate::registry::ConnectionId;
use crate::types::*;

impl World {
    /// Submit or overwrite the caller's answer for the active round.
    /// There is at most one answer per (game, round, player).
    pub fn set_answer(&mut self, conn: ConnectionId, text: String) -> SyncResult<Answer> {
        let player = self.player_for(conn)?;
        let round = self.active_round_for(conn)?;

        let existing = self.repo.answers().find(&|a| {
            a.game_id == round.game_id && a.round_id == round.id && a.player_id == player.id
        });

        let answer = match existing.first() {
            Some(prev) => self
                .repo
                .answers_mut()
                .update(&prev.id, &mut |a| a.text = text.clone())
                .ok_or_else(|| SyncError::not_found(format!("answer {}", prev.id)))?,
            None => {
                let answer = Answer {
                    id: new_id(),
                    game_id: round.game_id.clone(),
                    round_id: round.id.clone(),
                    player_id: player.id.clone(),
                    text,
                    revealed_to_players: false,
                };
                self.repo.answers_mut().insert(answer.clone());
                answer
            }
        };
        tracing::debug!(
            "{} answered round {} of game {}",
            player.nickname,
            round.sequence_number,
            round.game_id
        );

        self.publish(&Audience::ActiveIn(answer.game_id.clone()), &[View::Answers]);
        Ok(answer)
    }

    /// Show or hide one answer to players
    pub fn set_answer_visibility(
        &mut self,
        conn: ConnectionId,
        answer_id: &str,
        revealed: bool,
    ) -> SyncResult<Answer> {
        self.player_for(conn)?;
        let answer = self
            .repo
            .answers_mut()
            .update(answer_id, &mut |a| a.revealed_to_players = revealed)
            .ok_or_else(|| SyncError::not_found(format!("answer {}", answer_id)))?;
        tracing::info!("Answer {} revealed={}", answer.id, revealed);

        self.publish(&Audience::ActiveIn(answer.game_id.clone()), &[View::Answers]);
        Ok(answer)
    }

    pub fn delete_answer(&mut self, conn: ConnectionId, answer_id: &str) -> SyncResult<Answer> {
        self.player_for(conn)?;
        let answer = self
            .repo
            .answers_mut()
            .remove(answer_id)
            .ok_or_else(|| SyncError::not_found(format!("answer {}", answer_id)))?;
        tracing::info!("Answer {} deleted", answer.id);

        self.publish(&Audience::ActiveIn(answer.game_id.clone()), &[View::Answers]);
        Ok(answer)
    }
}
