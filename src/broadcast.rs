use crate::profiles::ProfileRegistry;
use crate::protocol::{MatchEvent, ServerMessage};
use crate::state::AppState;
use crate::types::Match;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Spawn a background task that applies elapsed production and voting deadlines
pub fn spawn_deadline_watcher(state: Arc<AppState>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tick).await;

            let advanced = state.expire_deadlines().await;
            if !advanced.is_empty() {
                tracing::debug!("Deadline sweep advanced {} match(es)", advanced.len());
            }
        }
    })
}

/// Spawn a background task that publishes live vote totals for matches in VOTING
pub fn spawn_vote_broadcaster(state: Arc<AppState>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut seq = 0u64;

        loop {
            tokio::time::sleep(tick).await;

            for (match_id, round, tally) in state.live_tallies().await {
                seq += 1;
                let msg = ServerMessage::VoteProgress {
                    match_id,
                    round,
                    tally,
                    seq,
                };

                // Ignore send errors (no receivers connected is fine)
                let _ = state.live.send(msg);
            }
        }
    })
}

/// Spawn a background task that turns match events into rating and record
/// updates. After falling behind the event channel it rebuilds what it missed
/// from match history.
pub fn spawn_rating_updater(state: Arc<AppState>) -> JoinHandle<()> {
    let mut events = state.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => apply_event(&state, &state.profiles, event).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Rating updater missed {} events, replaying history", missed);
                    replay_history(&state, &state.profiles).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Apply every resolved round and decided match known to `state`. Results
/// already applied are skipped, so this is safe to run at any time.
pub async fn replay_history(state: &AppState, profiles: &ProfileRegistry) {
    let mut matches = state.archived_matches().await;
    matches.extend(state.list_matches().await);

    for m in &matches {
        for record in &m.history {
            if let Some(winner) = record.verdict.winner() {
                credit_backers(profiles, m, record.round, winner).await;
            }
        }
        if let Some(winner) = m.winner.as_deref() {
            rate(profiles, m, winner).await;
        }
    }
    tracing::info!("Replayed rating history of {} match(es)", matches.len());
}

async fn apply_event(state: &AppState, profiles: &ProfileRegistry, event: MatchEvent) {
    match event {
        MatchEvent::MatchFinished {
            match_id,
            winner: Some(winner),
            ..
        } => match state.get_match(&match_id).await {
            Ok(m) => rate(profiles, &m, &winner).await,
            Err(e) => tracing::warn!("No match {} for rating update: {}", match_id, e),
        },
        MatchEvent::RoundResolved {
            match_id,
            round,
            verdict,
            ..
        } => {
            let Some(winner) = verdict.winner() else {
                return;
            };
            match state.get_match(&match_id).await {
                Ok(m) => credit_backers(profiles, &m, round, winner).await,
                Err(e) => tracing::warn!("No match {} for vote credit: {}", match_id, e),
            }
        }
        _ => {}
    }
}

async fn rate(profiles: &ProfileRegistry, m: &Match, winner: &str) {
    if let Some(loser) = m.players.iter().find(|p| p.as_str() != winner) {
        profiles.record_match(&m.id, winner, loser).await;
    }
}

async fn credit_backers(profiles: &ProfileRegistry, m: &Match, round: u32, winner: &str) {
    let voters: Vec<_> = m
        .ballots_for_round(round)
        .filter(|b| b.player_id == winner)
        .map(|b| b.voter_id.clone())
        .collect();
    profiles.credit_round(&m.id, round, &voters).await;
}
