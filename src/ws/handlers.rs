//! WebSocket message dispatch
//!
//! One inbound envelope is resolved, applied and fanned out under a single
//! hold of the world lock. The returned [`Flow`] tells the socket loop
//! whether the session survives.

use crate::broadcast::View;
use crate::error::SyncResult;
use crate::protocol::{ClientKind, Envelope, HelloPayload, NextRoundPayload, UNKNOWN_MESSAGE_TYPE};
use crate::registry::ConnectionId;
use crate::state::{AppState, World};
use std::sync::Arc;

/// What the socket loop does after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Teardown,
}

/// Decode one text frame and dispatch it. A frame that is not an envelope
/// ends the session.
pub async fn handle_text(text: &str, conn: ConnectionId, state: &Arc<AppState>) -> Flow {
    match Envelope::decode(text) {
        Ok(envelope) => handle_message(envelope, conn, state).await,
        Err(e) => {
            tracing::error!("{} sent an undecodable frame: {}", conn, e);
            Flow::Teardown
        }
    }
}

/// Handle one client message
pub async fn handle_message(
    envelope: Envelope,
    conn: ConnectionId,
    state: &Arc<AppState>,
) -> Flow {
    let mut world = state.world().await;

    let Some(kind) = ClientKind::parse(&envelope.kind) else {
        tracing::warn!("{} sent unknown message type {:?}", conn, envelope.kind);
        world.reply(conn, Envelope::error(UNKNOWN_MESSAGE_TYPE));
        return Flow::Continue;
    };
    tracing::debug!("{} -> {:?}", conn, kind);

    match dispatch(&mut world, conn, kind, envelope) {
        Ok(()) => Flow::Continue,
        Err(e) if kind.is_read_only() => {
            tracing::warn!("{:?} for {} failed: {}", kind, conn, e);
            world.reply(conn, Envelope::error(e.to_string()));
            Flow::Continue
        }
        Err(e) => {
            tracing::error!(
                "{:?} for {} failed, closing: {} ({})",
                kind,
                conn,
                e,
                e.code()
            );
            Flow::Teardown
        }
    }
}

fn dispatch(
    world: &mut World,
    conn: ConnectionId,
    kind: ClientKind,
    envelope: Envelope,
) -> SyncResult<()> {
    match kind {
        // Handshake failures are logged, and the caller still gets whatever
        // snapshot resolves
        ClientKind::SayHello => {
            let result = envelope
                .payload_as::<HelloPayload>()
                .and_then(|hello| world.say_hello(conn, hello));
            if let Err(e) = result {
                tracing::warn!("Handshake on {} failed: {}", conn, e);
            }
            world.hello_snapshot(conn);
        }

        ClientKind::CreateGame => {
            world.create_game(conn, envelope.payload)?;
        }
        ClientKind::JoinGame => world.join_game(conn, &envelope.payload)?,
        ClientKind::LeaveGame => world.leave_game(conn, &envelope.payload)?,
        ClientKind::DeleteGame => world.delete_game(conn, &envelope.payload)?,

        ClientKind::SetText => {
            world.set_text(conn, envelope.payload)?;
        }
        ClientKind::StartRound => {
            world.start_round(conn)?;
        }
        ClientKind::EndRound => {
            world.end_round(conn)?;
        }
        ClientKind::GoNextRound => {
            let request = envelope.payload_as::<NextRoundPayload>()?;
            world.go_next_round(conn, request)?;
        }

        ClientKind::SetAnswer => {
            world.set_answer(conn, envelope.payload)?;
        }
        ClientKind::SetAnswerVisible => {
            world.set_answer_visibility(conn, &envelope.payload, true)?;
        }
        ClientKind::SetAnswerInvisible => {
            world.set_answer_visibility(conn, &envelope.payload, false)?;
        }
        ClientKind::DeleteAnswer => {
            world.delete_answer(conn, &envelope.payload)?;
        }

        ClientKind::GetConnectedPlayers => world.reply_view(conn, View::Roster)?,
        ClientKind::GetRounds => world.reply_view(conn, View::Rounds)?,
        ClientKind::GetRound => world.reply_view(conn, View::Round)?,
        ClientKind::GetGame => world.reply_view(conn, View::Game)?,
        ClientKind::GetText => world.reply_view(conn, View::Text)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OutboxRx;
    use crate::repository::Collection;

    async fn connect(state: &Arc<AppState>) -> (ConnectionId, OutboxRx) {
        state.connect().await
    }

    fn frame(kind: &str, payload: &str) -> Envelope {
        Envelope {
            kind: kind.to_string(),
            payload: payload.to_string(),
        }
    }

    fn drain(rx: &mut OutboxRx) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(env) = rx.try_recv() {
            out.push(env);
        }
        out
    }

    #[tokio::test]
    async fn test_unknown_type_keeps_connection() {
        let state = Arc::new(AppState::new());
        let (conn, mut rx) = connect(&state).await;

        let flow = handle_message(frame("dance", ""), conn, &state).await;

        assert_eq!(flow, Flow::Continue);
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.kind, "error");
        assert_eq!(reply.payload, "unknown message type");
    }

    #[tokio::test]
    async fn test_garbage_frame_tears_down() {
        let state = Arc::new(AppState::new());
        let (conn, _rx) = connect(&state).await;

        assert_eq!(handle_text("{not json", conn, &state).await, Flow::Teardown);
    }

    #[tokio::test]
    async fn test_hello_sends_uuid_then_snapshot() {
        let state = Arc::new(AppState::new());
        let (conn, mut rx) = connect(&state).await;

        let flow = handle_text(
            r#"{"type":"say_hello","payload":"{\"name\":\"Alice\",\"uuid\":\"\"}"}"#,
            conn,
            &state,
        )
        .await;

        assert_eq!(flow, Flow::Continue);
        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        // no game yet: only the global list resolves
        assert_eq!(kinds, vec!["set_uuid", "get_games"]);
    }

    #[tokio::test]
    async fn test_malformed_hello_still_snapshots() {
        let state = Arc::new(AppState::new());
        let (conn, mut rx) = connect(&state).await;

        let flow = handle_message(frame("say_hello", "???"), conn, &state).await;

        assert_eq!(flow, Flow::Continue);
        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec!["get_games"]);
        assert!(state.world().await.registry.player_of(conn).is_none());
    }

    #[tokio::test]
    async fn test_mutation_before_handshake_tears_down() {
        let state = Arc::new(AppState::new());
        let (conn, _rx) = connect(&state).await;

        let flow = handle_message(frame("create_game", "Quiz"), conn, &state).await;

        assert_eq!(flow, Flow::Teardown);
        assert!(state.world().await.repo.games().all().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_failure_replies_error() {
        let state = Arc::new(AppState::new());
        let (conn, mut rx) = connect(&state).await;
        handle_message(frame("say_hello", r#"{"name":"Bob"}"#), conn, &state).await;
        drain(&mut rx);

        let flow = handle_message(frame("get_round", ""), conn, &state).await;

        assert_eq!(flow, Flow::Continue);
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.kind, "error");
        assert!(reply.payload.contains("no active game"));
    }

    #[tokio::test]
    async fn test_bad_next_round_payload_tears_down() {
        let state = Arc::new(AppState::new());
        let (conn, _rx) = connect(&state).await;
        handle_message(frame("say_hello", r#"{"name":"Mod"}"#), conn, &state).await;

        let flow = handle_message(frame("go_next_round", "not json"), conn, &state).await;
        assert_eq!(flow, Flow::Teardown);
    }

    #[tokio::test]
    async fn test_join_unknown_game_keeps_connection() {
        let state = Arc::new(AppState::new());
        let (conn, mut rx) = connect(&state).await;
        handle_message(frame("say_hello", r#"{"name":"Pat"}"#), conn, &state).await;
        drain(&mut rx);

        let flow = handle_message(frame("join_game", "nope"), conn, &state).await;

        assert_eq!(flow, Flow::Continue);
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.kind, "join_game");
        assert_eq!(reply.payload, "false");
    }
}
