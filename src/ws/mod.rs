pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Caller identity: competitor id for ready signals, voter id for ballots
    pub user: Option<String>,
    /// Only push events for this match; every match when unset
    #[serde(rename = "match")]
    pub match_id: Option<String>,
}

/// Whether a broadcast message passes the connection's match filter.
/// Direct replies to the client are never filtered.
fn wanted(filter: Option<&str>, msg: &ServerMessage) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    match msg {
        ServerMessage::Event { event } => event.match_id() == filter,
        ServerMessage::VoteProgress { match_id, .. } => match_id == filter,
        _ => true,
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: user={:?} match={:?}",
        params.user,
        params.match_id
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let user = params.user.filter(|u| !u.trim().is_empty());
    let filter = params.match_id.filter(|m| !m.trim().is_empty());

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        user_id: user.clone(),
        server_now: state.now().to_rfc3339(),
    };

    if let Ok(msg) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            tracing::error!("Failed to send welcome message");
            return;
        }
    }

    let mut events_rx = state.subscribe();
    let mut live_rx = state.live.subscribe();

    loop {
        let outgoing = tokio::select! {
            // State machine events
            event = events_rx.recv() => match event {
                Ok(event) => Some(ServerMessage::Event { event })
                    .filter(|msg| wanted(filter.as_deref(), msg)),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Client {:?} lagged by {} events", user, missed);
                    None
                }
                Err(RecvError::Closed) => break,
            },

            // Vote progress
            live = live_rx.recv() => match live {
                Ok(msg) => Some(msg).filter(|msg| wanted(filter.as_deref(), msg)),
                Err(RecvError::Lagged(_)) => None,
                Err(RecvError::Closed) => break,
            },

            // Client messages
            ws_msg = receiver.next() => match ws_msg {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("Received message: {}", text);

                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            handlers::handle_message(client_msg, user.as_deref(), &state).await
                        }
                        Err(e) => {
                            tracing::error!("Failed to parse client message: {}", e);
                            Some(ServerMessage::Error {
                                code: "PARSE_ERROR".to_string(),
                                msg: format!("Invalid message format: {}", e),
                            })
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("WebSocket closed");
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                    None
                }
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
                None => break,
            },
        };

        if let Some(msg) = outgoing {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    tracing::error!("Failed to send message");
                    break;
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed for user: {:?}", user);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MatchEvent;
    use crate::types::{FinishReason, Phase};

    fn finished(match_id: &str) -> ServerMessage {
        ServerMessage::Event {
            event: MatchEvent::MatchFinished {
                match_id: match_id.to_string(),
                winner: None,
                reason: FinishReason::Draw,
            },
        }
    }

    #[test]
    fn test_match_filter() {
        assert!(wanted(None, &finished("m1")));
        assert!(wanted(Some("m1"), &finished("m1")));
        assert!(!wanted(Some("m1"), &finished("m2")));

        let phase = ServerMessage::Event {
            event: MatchEvent::PhaseChanged {
                match_id: "m2".to_string(),
                from: Phase::Production,
                to: Phase::Voting,
                round: 1,
                deadline: None,
            },
        };
        assert!(!wanted(Some("m1"), &phase));
        assert!(wanted(Some("m1"), &ServerMessage::Ack));
    }

    #[test]
    fn test_query_uses_match_key() {
        let query: WsQuery = serde_json::from_str(r#"{"user":"fan","match":"m1"}"#).unwrap();
        assert_eq!(query.match_id.as_deref(), Some("m1"));
        assert_eq!(query.user.as_deref(), Some("fan"));
    }
}
