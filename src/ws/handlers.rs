//! WebSocket message dispatch
//!
//! Maps client messages onto state machine operations. Errors come back as
//! `ServerMessage::Error` with the error's stable code.

use crate::error::MatchError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

/// Resolve the connection's user or bail out with an error response
macro_rules! require_user {
    ($user:expr, $action:expr) => {
        match $user {
            Some(user) => user,
            None => {
                return Some(error_response(&MatchError::InvalidRequest(format!(
                    "Connect with ?user=<id> to {}",
                    $action
                ))))
            }
        }
    };
}

fn error_response(e: &MatchError) -> ServerMessage {
    if e.is_retryable() {
        tracing::error!("Request failed: {}", e);
    } else {
        tracing::info!("Request rejected: {}", e);
    }
    ServerMessage::from(e)
}

fn match_state(result: Result<crate::types::Match, MatchError>) -> Option<ServerMessage> {
    Some(match result {
        Ok(m) => ServerMessage::MatchState { state: Box::new(m) },
        Err(e) => error_response(&e),
    })
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    user: Option<&str>,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateMatch { player_a, player_b } => match player_b {
            Some(player_b) => {
                tracing::info!("Create match request: {} vs {}", player_a, player_b);
                match_state(state.create_match(player_a, player_b).await)
            }
            None => {
                tracing::info!("Open match request from {}", player_a);
                match_state(state.open_match(player_a).await)
            }
        },

        ClientMessage::JoinMatch { match_id } => {
            let user = require_user!(user, "join a match");
            match_state(state.join_match(&match_id, user).await)
        }

        ClientMessage::ListMatches => Some(ServerMessage::MatchList {
            matches: state.match_summaries().await,
        }),

        ClientMessage::Ready { match_id } => {
            let user = require_user!(user, "signal ready");
            match_state(state.signal_ready(&match_id, user).await)
        }

        ClientMessage::SubmissionReady { match_id } => {
            let user = require_user!(user, "finish a submission");
            match_state(state.signal_submission_ready(&match_id, user).await)
        }

        ClientMessage::Vote {
            match_id,
            player_id,
            msg_id,
        } => {
            let voter = require_user!(user, "vote");
            match state
                .cast_ballot_with_reputation(state.profiles.as_ref(), &match_id, voter, &player_id)
                .await
            {
                Ok(ballot) => Some(ServerMessage::VoteAck {
                    msg_id,
                    weight: ballot.weight,
                }),
                Err(e) => Some(error_response(&e)),
            }
        }

        ClientMessage::Cancel { match_id, reason } => {
            let user = require_user!(user, "cancel a match");
            match_state(state.cancel(&match_id, user, &reason).await)
        }

        ClientMessage::GetMatch { match_id } => match_state(state.get_match(&match_id).await),
    }
}
