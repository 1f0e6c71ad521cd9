use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type GameId = String;
pub type RoundId = String;
pub type AnswerId = String;

/// Mint a fresh opaque identifier for any entity.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: GameId,
    pub name: String,
    /// The creator; not necessarily listed in `players`
    pub moderator_id: PlayerId,
    /// Joined players. Kept free of duplicates on join.
    #[serde(default)]
    pub players: Vec<PlayerId>,
}

impl Game {
    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p == player_id)
    }

    pub fn is_moderator(&self, player_id: &str) -> bool {
        self.moderator_id == player_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: RoundId,
    pub game_id: GameId,
    /// 1-based position of the round within its game
    pub sequence_number: u32,
    pub active: bool,
    pub question: String,
    pub started: bool,
    pub ended: bool,
}

impl Round {
    /// A fresh, active round with an empty question.
    pub fn opening(game_id: &str, sequence_number: u32) -> Self {
        Self {
            id: new_id(),
            game_id: game_id.to_string(),
            sequence_number,
            active: true,
            question: String::new(),
            started: false,
            ended: false,
        }
    }

    /// Retire this round when the game advances past it.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.started = false;
        self.ended = true;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: AnswerId,
    pub game_id: GameId,
    pub round_id: RoundId,
    pub player_id: PlayerId,
    pub text: String,
    pub revealed_to_players: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_serializes_camel_case() {
        let round = Round::opening("g1", 1);
        let json = serde_json::to_value(&round).unwrap();

        assert_eq!(json["gameId"], "g1");
        assert_eq!(json["sequenceNumber"], 1);
        assert_eq!(json["active"], true);
        assert_eq!(json["question"], "");
    }

    #[test]
    fn test_deactivate_round() {
        let mut round = Round::opening("g1", 3);
        round.started = true;
        round.deactivate();

        assert!(!round.active);
        assert!(!round.started);
        assert!(round.ended);
        assert_eq!(round.sequence_number, 3);
    }

    #[test]
    fn test_game_membership() {
        let game = Game {
            id: "g".to_string(),
            name: "Quiz".to_string(),
            moderator_id: "m".to_string(),
            players: vec!["p".to_string()],
        };

        assert!(game.has_player("p"));
        assert!(!game.has_player("m"));
        assert!(game.is_moderator("m"));
    }
}
