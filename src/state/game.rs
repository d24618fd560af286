use super::AppState;
use crate::config::MatchConfig;
use crate::error::{MatchError, MatchResult};
use crate::game::{generate_board, CategoryPool};
use crate::protocol::MatchEvent;
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Build a fresh match in `Waiting` with a board per seat. Without an
/// opponent the second seat stays open for [`AppState::join_match`].
pub fn new_match(
    config: &MatchConfig,
    pool: &CategoryPool,
    creator: PlayerId,
    opponent: Option<PlayerId>,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> MatchResult<Match> {
    let mut players = vec![creator];
    players.extend(opponent);
    if players.iter().any(|p| p.trim().is_empty()) {
        return Err(MatchError::InvalidRequest(
            "Player ids must not be empty".to_string(),
        ));
    }
    if players.len() == SEATS && players[0] == players[1] {
        return Err(MatchError::InvalidRequest(
            "A match needs two different players".to_string(),
        ));
    }

    let board_a = generate_board(pool, config.board_size, config.free_cell, rng)?;
    let board_b = generate_board(pool, config.board_size, config.free_cell, rng)?;

    Ok(Match {
        id: ulid::Ulid::new().to_string(),
        version: 0,
        players,
        boards: [board_a, board_b],
        called: Vec::new(),
        current_category: None,
        phase: Phase::Waiting,
        round: 0,
        deadline: None,
        winner: None,
        finish_reason: None,
        ready: BTreeSet::new(),
        submitted: BTreeSet::new(),
        ballots: Vec::new(),
        history: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

impl AppState {
    /// Create a match between two players and persist it
    pub async fn create_match(&self, player_a: PlayerId, player_b: PlayerId) -> MatchResult<Match> {
        self.insert_match(player_a, Some(player_b)).await
    }

    /// Create a match with the second seat left open
    pub async fn open_match(&self, creator: PlayerId) -> MatchResult<Match> {
        self.insert_match(creator, None).await
    }

    async fn insert_match(
        &self,
        creator: PlayerId,
        opponent: Option<PlayerId>,
    ) -> MatchResult<Match> {
        let now = self.now();
        let next = self.with_rng(|rng| {
            new_match(&self.config, &self.pool, creator, opponent, now, rng)
        })?;

        let mut created = next.clone();
        self.commit(&mut created, next, Vec::new()).await?;

        let id = created.id.clone();
        tracing::info!(
            "Created match {} ({})",
            id,
            created.players.join(" vs ")
        );
        self.matches
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(created.clone())));
        Ok(created)
    }

    /// Take the open seat of a waiting match
    pub async fn join_match(&self, match_id: &str, player_id: &str) -> MatchResult<Match> {
        let slot = self.slot(match_id).await?;
        let mut current = slot.lock().await;

        if current.phase != Phase::Waiting {
            return Err(MatchError::InvalidPhase {
                phase: current.phase,
            });
        }
        if player_id.trim().is_empty() {
            return Err(MatchError::InvalidRequest(
                "Player ids must not be empty".to_string(),
            ));
        }
        if current.is_participant(player_id) {
            return Ok(current.clone());
        }
        if current.is_full() {
            return Err(MatchError::MatchFull(match_id.to_string()));
        }

        let mut next = current.clone();
        next.players.push(player_id.to_string());
        tracing::info!("Player {} joined match {}", player_id, match_id);

        self.commit(&mut current, next, Vec::new()).await?;
        Ok(current.clone())
    }

    /// Record that a competitor is ready. The match starts once both are.
    pub async fn signal_ready(&self, match_id: &str, player_id: &str) -> MatchResult<Match> {
        let slot = self.slot(match_id).await?;
        let mut current = slot.lock().await;

        if current.phase.is_terminal() {
            return Err(MatchError::InvalidPhase {
                phase: current.phase,
            });
        }
        if !current.is_participant(player_id) {
            tracing::warn!("Ready from non-participant {} in {}", player_id, match_id);
            return Err(MatchError::UnauthorizedParticipant(player_id.to_string()));
        }
        if current.phase != Phase::Waiting || current.ready.contains(player_id) {
            return Ok(current.clone());
        }

        let mut next = current.clone();
        let mut events = Vec::new();
        next.ready.insert(player_id.to_string());
        tracing::info!("Player {} ready in {}", player_id, match_id);

        if next.is_full() && next.ready.len() == SEATS {
            self.start_round(&mut next, &mut events)?;
        }

        self.commit(&mut current, next, events).await?;
        Ok(current.clone())
    }

    /// Cancel a match that has not ended yet. Only a seated player or a
    /// configured operator may do so.
    pub async fn cancel(
        &self,
        match_id: &str,
        requester: &str,
        reason: &str,
    ) -> MatchResult<Match> {
        let slot = self.slot(match_id).await?;
        let mut current = slot.lock().await;

        if !current.is_participant(requester) && !self.config.is_operator(requester) {
            tracing::warn!("Cancel of {} refused for {}", match_id, requester);
            return Err(MatchError::UnauthorizedParticipant(requester.to_string()));
        }

        let mut next = current.clone();
        let mut events = Vec::new();
        finish(
            &mut next,
            Phase::Cancelled,
            None,
            FinishReason::Cancelled {
                reason: reason.to_string(),
            },
            &mut events,
        )?;
        tracing::info!("Match {} cancelled by {}: {}", match_id, requester, reason);

        self.commit(&mut current, next, events).await?;
        Ok(current.clone())
    }
}

/// Check if a phase transition is valid
pub(super) fn is_valid_transition(from: Phase, to: Phase) -> bool {
    use Phase::*;

    match (from, to) {
        (Waiting, Production) => true,
        // Nothing to call at all
        (Waiting, Finished) => true,
        (Production, Voting) => true,
        (Voting, Resolving) => true,
        (Resolving, Production) => true,
        (Resolving, Finished) => true,

        (Waiting | Production | Voting, Cancelled) => true,

        _ => false,
    }
}

/// Move `m` to `to`, arming `deadline`. `Resolving` is internal and emits
/// nothing.
pub(super) fn enter_phase(
    m: &mut Match,
    to: Phase,
    deadline: Option<DateTime<Utc>>,
    events: &mut Vec<MatchEvent>,
) -> MatchResult<()> {
    let from = m.phase;
    if !is_valid_transition(from, to) {
        return Err(MatchError::InvalidPhase { phase: from });
    }

    m.phase = to;
    m.deadline = deadline;
    tracing::debug!("Match {} phase {:?} -> {:?}", m.id, from, to);

    if to != Phase::Resolving {
        // Resolving swallows the phase we came from
        let from = if from == Phase::Resolving {
            Phase::Voting
        } else {
            from
        };
        events.push(MatchEvent::PhaseChanged {
            match_id: m.id.clone(),
            from,
            to,
            round: m.current_round_no(),
            deadline,
        });
    }
    Ok(())
}

/// End the match in a terminal phase
pub(super) fn finish(
    m: &mut Match,
    to: Phase,
    winner: Option<PlayerId>,
    reason: FinishReason,
    events: &mut Vec<MatchEvent>,
) -> MatchResult<()> {
    enter_phase(m, to, None, events)?;
    m.current_category = None;
    m.winner = winner.clone();
    m.finish_reason = Some(reason.clone());

    tracing::info!(
        "Match {} ended ({:?}) winner={:?}",
        m.id,
        reason,
        winner
    );
    events.push(MatchEvent::MatchFinished {
        match_id: m.id.clone(),
        winner,
        reason,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{harness, harness_with};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_transition_table() {
        use Phase::*;
        assert!(is_valid_transition(Waiting, Production));
        assert!(is_valid_transition(Voting, Resolving));
        assert!(is_valid_transition(Resolving, Production));
        assert!(is_valid_transition(Production, Cancelled));
        assert!(is_valid_transition(Voting, Cancelled));

        assert!(!is_valid_transition(Production, Resolving));
        assert!(!is_valid_transition(Waiting, Voting));
        assert!(!is_valid_transition(Finished, Cancelled));
        assert!(!is_valid_transition(Cancelled, Production));
        assert!(!is_valid_transition(Resolving, Cancelled));
    }

    #[test]
    fn test_new_match_boards_differ_per_player() {
        let mut rng = StdRng::seed_from_u64(3);
        let m = new_match(
            &MatchConfig::default(),
            &CategoryPool::beat_genres(),
            "alice".to_string(),
            Some("bob".to_string()),
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(m.phase, Phase::Waiting);
        assert_eq!(m.boards[0].size(), 5);
        assert_ne!(m.boards[0], m.boards[1]);
        assert!(m.boards.iter().all(|b| b.marked_count() == 1));
    }

    #[test]
    fn test_new_match_rejects_bad_players() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = CategoryPool::beat_genres();
        let config = MatchConfig::default();

        for (creator, opponent) in [("", Some("bob")), ("alice", Some("alice")), (" ", None)] {
            let result = new_match(
                &config,
                &pool,
                creator.to_string(),
                opponent.map(str::to_string),
                Utc::now(),
                &mut rng,
            );
            assert!(matches!(result, Err(MatchError::InvalidRequest(_))));
        }
    }

    #[test]
    fn test_new_match_insufficient_pool() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = CategoryPool::new(["a", "b", "c"]);
        let result = new_match(
            &MatchConfig::default(),
            &pool,
            "alice".to_string(),
            Some("bob".to_string()),
            Utc::now(),
            &mut rng,
        );
        assert!(matches!(
            result,
            Err(MatchError::InsufficientPool {
                available: 3,
                required: 24
            })
        ));
    }

    #[test]
    fn test_finish_emits_phase_and_result() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut m = new_match(
            &MatchConfig::default(),
            &CategoryPool::beat_genres(),
            "alice".to_string(),
            Some("bob".to_string()),
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        let mut events = Vec::new();
        finish(
            &mut m,
            Phase::Cancelled,
            None,
            FinishReason::Cancelled {
                reason: "no show".to_string(),
            },
            &mut events,
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            MatchEvent::PhaseChanged {
                to: Phase::Cancelled,
                ..
            }
        ));
        assert!(matches!(events[1], MatchEvent::MatchFinished { .. }));

        // A second finish is rejected
        let again = finish(
            &mut m,
            Phase::Cancelled,
            None,
            FinishReason::Cancelled {
                reason: "twice".to_string(),
            },
            &mut events,
        );
        assert!(matches!(
            again,
            Err(MatchError::InvalidPhase {
                phase: Phase::Cancelled
            })
        ));
    }

    #[tokio::test]
    async fn test_join_fills_the_open_seat_once() {
        let h = harness();
        let m = h.state.open_match("alice".to_string()).await.unwrap();
        assert_eq!(m.players, vec!["alice".to_string()]);

        // The creator alone cannot start the match
        let m = h.state.signal_ready(&m.id, "alice").await.unwrap();
        assert_eq!(m.phase, Phase::Waiting);
        assert!(matches!(
            h.state.signal_ready(&m.id, "bob").await,
            Err(MatchError::UnauthorizedParticipant(_))
        ));

        let joined = h.state.join_match(&m.id, "bob").await.unwrap();
        assert!(joined.is_full());
        assert_eq!(joined.players[1], "bob");

        // Joining again is a no-op, a third player is turned away
        let again = h.state.join_match(&m.id, "bob").await.unwrap();
        assert_eq!(again.version, joined.version);
        assert!(matches!(
            h.state.join_match(&m.id, "carol").await,
            Err(MatchError::MatchFull(_))
        ));

        let started = h.state.signal_ready(&m.id, "bob").await.unwrap();
        assert_eq!(started.phase, Phase::Production);
        assert!(matches!(
            h.state.join_match(&m.id, "carol").await,
            Err(MatchError::InvalidPhase {
                phase: Phase::Production
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_requires_a_seat_or_operator() {
        let h = harness_with(MatchConfig {
            operators: vec!["referee".to_string()],
            ..MatchConfig::default()
        });
        let m = h.started_match().await;

        let refused = h.state.cancel(&m.id, "random_spectator", "grief").await;
        assert!(matches!(
            refused,
            Err(MatchError::UnauthorizedParticipant(ref id)) if id == "random_spectator"
        ));
        let unchanged = h.state.get_match(&m.id).await.unwrap();
        assert_eq!(unchanged.phase, Phase::Production);
        assert_eq!(unchanged.version, m.version);

        let cancelled = h.state.cancel(&m.id, "referee", "stream ended").await.unwrap();
        assert_eq!(cancelled.phase, Phase::Cancelled);

        let other = h.started_match().await;
        let forfeit = h.state.cancel(&other.id, "bob", "forfeit").await.unwrap();
        assert_eq!(forfeit.phase, Phase::Cancelled);
    }
}
