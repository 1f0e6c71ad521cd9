use crate::error::SyncResult;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Every frame on the socket, in both directions, is one envelope.
/// `payload` is an opaque string, often a nested JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: String,
}

impl Envelope {
    pub fn new(kind: ServerKind, payload: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            payload: payload.into(),
        }
    }

    /// Build an envelope whose payload is the JSON encoding of `value`
    pub fn json<T: Serialize>(kind: ServerKind, value: &T) -> SyncResult<Self> {
        Ok(Self::new(kind, serde_json::to_string(value)?))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(ServerKind::Error, msg)
    }

    pub fn decode(text: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the nested JSON payload
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> SyncResult<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Inbound message types understood by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    SayHello,
    CreateGame,
    JoinGame,
    LeaveGame,
    SetAnswer,
    SetText,
    SetAnswerVisible,
    SetAnswerInvisible,
    GetConnectedPlayers,
    StartRound,
    EndRound,
    GetRounds,
    GetRound,
    GetGame,
    GetText,
    DeleteAnswer,
    DeleteGame,
    GoNextRound,
}

impl ClientKind {
    pub fn parse(kind: &str) -> Option<Self> {
        let kind = match kind {
            "say_hello" => Self::SayHello,
            "create_game" => Self::CreateGame,
            "join_game" => Self::JoinGame,
            "leave_game" => Self::LeaveGame,
            "set_answer" => Self::SetAnswer,
            "set_text" => Self::SetText,
            "set_answer_visible" => Self::SetAnswerVisible,
            "set_answer_invisible" => Self::SetAnswerInvisible,
            "get_connected_players" => Self::GetConnectedPlayers,
            "start_round" => Self::StartRound,
            "end_round" => Self::EndRound,
            "get_rounds" => Self::GetRounds,
            "get_round" => Self::GetRound,
            "get_game" => Self::GetGame,
            "get_text" => Self::GetText,
            "delete_answer" => Self::DeleteAnswer,
            "delete_game" => Self::DeleteGame,
            "go_next_round" => Self::GoNextRound,
            _ => return None,
        };
        Some(kind)
    }

    /// Queries that only read state. Their failures never tear the connection down.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::GetConnectedPlayers | Self::GetRounds | Self::GetRound | Self::GetGame | Self::GetText
        )
    }
}

/// Outbound and broadcast message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    SetUuid,
    PlayerConnected,
    PlayerDisconnected,
    CreateGame,
    JoinGame,
    LeaveGame,
    GetGames,
    GetRounds,
    GetRound,
    GetGame,
    AllAnswers,
    GetConnectedPlayers,
    SetText,
    GameDeleted,
    Error,
}

impl ServerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetUuid => "set_uuid",
            Self::PlayerConnected => "player_connected",
            Self::PlayerDisconnected => "player_disconnected",
            Self::CreateGame => "create_game",
            Self::JoinGame => "join_game",
            Self::LeaveGame => "leave_game",
            Self::GetGames => "get_games",
            Self::GetRounds => "get_rounds",
            Self::GetRound => "get_round",
            Self::GetGame => "get_game",
            Self::AllAnswers => "all_answers",
            Self::GetConnectedPlayers => "get_connected_players",
            Self::SetText => "set_text",
            Self::GameDeleted => "game_deleted",
            Self::Error => "error",
        }
    }
}

/// Reply to any inbound type the router does not know
pub const UNKNOWN_MESSAGE_TYPE: &str = "unknown message type";

/// Payload of `join_game` when the requested game does not exist
pub const JOIN_REJECTED: &str = "false";

/// `say_hello` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelloPayload {
    #[serde(default, alias = "nickname")]
    pub name: String,
    /// Previously issued player id; empty or absent on first contact
    #[serde(default)]
    pub uuid: Option<PlayerId>,
}

impl HelloPayload {
    pub fn known_id(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|id| !id.is_empty())
    }
}

/// `go_next_round` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextRoundPayload {
    pub game_id: GameId,
    #[serde(default)]
    pub round_id: Option<RoundId>,
}

/// HTTP `POST /game` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub name: String,
    pub uuid: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub id: GameId,
}
