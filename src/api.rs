//! HTTP API endpoints for read-only match, lobby and profile lookups.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::MatchError;
use crate::profiles::PlayerProfile;
use crate::state::AppState;
use crate::types::MatchSummary;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: PlayerProfile,
    pub rank: &'static str,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/matches", get(list_matches))
        .route("/api/matches/{id}", get(get_match))
        .route("/api/matches/{id}/rounds/{round}", get(get_round_outcome))
        .route("/api/profiles/{id}", get(get_profile))
}

fn status_for(e: &MatchError) -> StatusCode {
    match e {
        MatchError::NotFound(_) => StatusCode::NOT_FOUND,
        MatchError::InvalidRequest(_) | MatchError::InvalidWeight { .. } => {
            StatusCode::BAD_REQUEST
        }
        MatchError::UnauthorizedParticipant(_) => StatusCode::FORBIDDEN,
        MatchError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        MatchError::Config(_) | MatchError::InsufficientPool { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        MatchError::InvalidPhase { .. }
        | MatchError::MatchFull(_)
        | MatchError::NotAcceptingVotes { .. }
        | MatchError::DuplicateVote { .. } => StatusCode::CONFLICT,
    }
}

impl IntoResponse for MatchError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            msg: self.to_string(),
        };
        (status_for(&self), Json(body)).into_response()
    }
}

/// Live matches, oldest first, with their open seats.
///
/// GET /api/matches
pub async fn list_matches(State(state): State<Arc<AppState>>) -> Json<Vec<MatchSummary>> {
    Json(state.match_summaries().await)
}

/// Current state of a live or archived match.
///
/// GET /api/matches/{id}
pub async fn get_match(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.get_match(&id).await {
        Ok(m) => Json(m).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Weighted vote totals for one round, recomputed from its ballots.
///
/// GET /api/matches/{id}/rounds/{round}
pub async fn get_round_outcome(
    State(state): State<Arc<AppState>>,
    Path((id, round)): Path<(String, u32)>,
) -> Response {
    match state.round_outcome(&id, round).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/profiles/{id}
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.profiles.get(&id).await {
        Some(profile) => {
            let rank = profile.rank().title();
            Json(ProfileResponse { profile, rank }).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                code: "NOT_FOUND".to_string(),
                msg: format!("No profile for {}", id),
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        router().with_state(state)
    }

    #[tokio::test]
    async fn test_get_match() {
        let state = Arc::new(AppState::new(MatchConfig::default()));
        let m = state
            .create_match("alice".to_string(), "bob".to_string())
            .await
            .unwrap();

        let response = app(state.clone())
            .oneshot(
                Request::get(format!("/api/matches/{}", m.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(state)
            .oneshot(
                Request::get("/api/matches/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_matches() {
        let state = Arc::new(AppState::new(MatchConfig::default()));
        let open = state.open_match("alice".to_string()).await.unwrap();
        let full = state
            .create_match("carol".to_string(), "dave".to_string())
            .await
            .unwrap();
        state.cancel(&full.id, "dave", "left").await.unwrap();

        let response = app(state)
            .oneshot(Request::get("/api/matches").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let lobby: Vec<MatchSummary> = serde_json::from_slice(&body).unwrap();
        assert_eq!(lobby.len(), 1);
        assert_eq!(lobby[0].id, open.id);
        assert!(lobby[0].open_seat);
    }

    #[tokio::test]
    async fn test_round_outcome_for_unknown_round() {
        let state = Arc::new(AppState::new(MatchConfig::default()));
        let m = state
            .create_match("alice".to_string(), "bob".to_string())
            .await
            .unwrap();

        let response = app(state)
            .oneshot(
                Request::get(format!("/api/matches/{}/rounds/5", m.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_profile() {
        let state = Arc::new(AppState::new(MatchConfig::default()));
        state.profiles.get_or_create("alice").await;

        let response = app(state.clone())
            .oneshot(
                Request::get("/api/profiles/alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(state)
            .oneshot(Request::get("/api/profiles/bob").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
