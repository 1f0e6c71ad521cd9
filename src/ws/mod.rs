pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::registry::{ConnectionId, OutboxRx};
use crate::state::AppState;
use handlers::Flow;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    run_session(receiver, sender, state).await;
}

/// Drive one connection until either side gives up.
///
/// The reader runs here; everything bound for the client goes through the
/// connection's outbox and is written by a separate task, so fanout from
/// other connections never waits on this socket. A writer that stops, on
/// error or deadline, ends the session the same way a client close does.
async fn run_session<R, S, E>(mut receiver: R, sender: S, state: Arc<AppState>)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: fmt::Display,
    E: fmt::Display,
{
    let (conn, outbox) = state.connect().await;
    let mut writer = tokio::spawn(write_frames(sender, outbox, conn, state.write_timeout));

    loop {
        tokio::select! {
            _ = &mut writer => {
                tracing::info!("{} writer stopped", conn);
                break;
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("{} received: {}", conn, text.as_str());
                        let flow = handlers::handle_text(text.as_str(), conn, &state).await;
                        if flow == Flow::Teardown {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("{} closed by client", conn);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error on {}: {}", conn, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Dropping the registry entry closes the outbox; the writer flushes
    // whatever is still queued and then closes the socket.
    state.disconnect(conn).await;
}

/// Drain a connection's outbox into its socket, one frame at a time, each
/// bounded by `deadline`.
async fn write_frames<S>(
    mut sender: S,
    mut outbox: OutboxRx,
    conn: ConnectionId,
    deadline: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(envelope) = outbox.recv().await {
        let json = match envelope.encode() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode {} for {}: {}", envelope.kind, conn, e);
                continue;
            }
        };

        match tokio::time::timeout(deadline, sender.send(Message::Text(json.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!("{} write failed: {}", conn, e);
                return;
            }
            Err(_) => {
                tracing::warn!("{} write exceeded {:?}, dropping connection", conn, deadline);
                return;
            }
        }
    }

    let _ = sender.close().await;
}
