use super::AppState;
use crate::error::{MatchError, MatchResult};
use crate::game::{tally, RoundTally};
use crate::profiles::ReputationSource;
use crate::rating::vote_power;
use crate::types::*;

impl AppState {
    /// Accept one spectator ballot for the round being voted on
    pub async fn cast_ballot(
        &self,
        match_id: &str,
        voter_id: &str,
        player_id: &str,
        weight: f64,
    ) -> MatchResult<Ballot> {
        let slot = self.slot(match_id).await?;
        let mut current = slot.lock().await;
        let now = self.now();

        match current.phase {
            phase if phase.is_terminal() => return Err(MatchError::InvalidPhase { phase }),
            Phase::Voting => {}
            phase => return Err(MatchError::NotAcceptingVotes { phase }),
        }
        // Deadline passed but the watcher has not closed the round yet
        if matches!(current.deadline, Some(deadline) if deadline <= now) {
            return Err(MatchError::NotAcceptingVotes {
                phase: current.phase,
            });
        }
        if current.is_participant(voter_id) {
            return Err(MatchError::UnauthorizedParticipant(voter_id.to_string()));
        }
        if !current.is_participant(player_id) {
            return Err(MatchError::UnauthorizedParticipant(player_id.to_string()));
        }
        let weight = self.config.weights.validate(weight)?;

        let round = current.current_round_no();
        if current.has_voted(voter_id, round) {
            return Err(MatchError::DuplicateVote {
                voter_id: voter_id.to_string(),
                round,
            });
        }

        let ballot = Ballot {
            match_id: current.id.clone(),
            round,
            voter_id: voter_id.to_string(),
            player_id: player_id.to_string(),
            weight,
            cast_at: now,
        };
        let mut next = current.clone();
        next.ballots.push(ballot.clone());

        self.commit(&mut current, next, Vec::new()).await?;
        tracing::debug!(
            "Ballot {} -> {} ({:.2}) in {} round {}",
            voter_id,
            player_id,
            weight,
            match_id,
            round
        );
        Ok(ballot)
    }

    /// Cast a ballot weighted by the voter's current spectator rating
    pub async fn cast_ballot_with_reputation(
        &self,
        reputation: &dyn ReputationSource,
        match_id: &str,
        voter_id: &str,
        player_id: &str,
    ) -> MatchResult<Ballot> {
        let elo = reputation.spectator_elo(voter_id).await;
        let weight = vote_power(elo, &self.config.weights);
        self.cast_ballot(match_id, voter_id, player_id, weight).await
    }

    /// Weighted totals for a round, recomputed from its ballots. Works for the
    /// round in progress as well as resolved ones.
    pub async fn round_outcome(&self, match_id: &str, round: u32) -> MatchResult<RoundTally> {
        let m = self.get_match(match_id).await?;
        let latest = if m.phase.is_terminal() {
            m.round
        } else {
            m.current_round_no()
        };
        if round == 0 || round > latest {
            return Err(MatchError::InvalidRequest(format!(
                "Round {} does not exist in match {}",
                round, match_id
            )));
        }
        Ok(tally(&m.players, m.ballots_for_round(round)))
    }

    /// Live totals for every match currently accepting votes
    pub async fn live_tallies(&self) -> Vec<(MatchId, u32, RoundTally)> {
        self.list_matches()
            .await
            .into_iter()
            .filter(|m| m.phase == Phase::Voting)
            .map(|m| {
                let round = m.current_round_no();
                let result = tally(&m.players, m.ballots_for_round(round));
                (m.id, round, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MatchError;
    use crate::profiles::ProfileRegistry;
    use crate::state::tests::harness;
    use crate::types::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_votes_only_while_voting() {
        let h = harness();
        let m = h
            .state
            .create_match("alice".to_string(), "bob".to_string())
            .await
            .unwrap();
        assert!(matches!(
            h.state.cast_ballot(&m.id, "fan", "alice", 1.0).await,
            Err(MatchError::NotAcceptingVotes {
                phase: Phase::Waiting
            })
        ));

        h.state.signal_ready(&m.id, "alice").await.unwrap();
        h.state.signal_ready(&m.id, "bob").await.unwrap();
        assert!(matches!(
            h.state.cast_ballot(&m.id, "fan", "alice", 1.0).await,
            Err(MatchError::NotAcceptingVotes {
                phase: Phase::Production
            })
        ));

        h.to_voting(&m.id).await;
        assert!(h.state.cast_ballot(&m.id, "fan", "alice", 1.0).await.is_ok());
    }

    #[tokio::test]
    async fn test_late_ballot_after_deadline_is_rejected() {
        let h = harness();
        let m = h.started_match().await;
        h.to_voting(&m.id).await;

        h.clock
            .advance(Duration::seconds(i64::from(h.state.config.voting_seconds)));
        assert!(matches!(
            h.state.cast_ballot(&m.id, "fan", "alice", 1.0).await,
            Err(MatchError::NotAcceptingVotes {
                phase: Phase::Voting
            })
        ));
        assert!(h.state.get_match(&m.id).await.unwrap().ballots.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ballot_is_rejected_not_overwritten() {
        let h = harness();
        let m = h.started_match().await;
        h.to_voting(&m.id).await;

        h.state.cast_ballot(&m.id, "fan", "alice", 1.0).await.unwrap();
        let second = h.state.cast_ballot(&m.id, "fan", "bob", 2.0).await;
        assert!(matches!(
            second,
            Err(MatchError::DuplicateVote { ref voter_id, round: 1 }) if voter_id == "fan"
        ));

        let m = h.state.get_match(&m.id).await.unwrap();
        assert_eq!(m.ballots.len(), 1);
        assert_eq!(m.ballots[0].player_id, "alice");
    }

    #[tokio::test]
    async fn test_malformed_ballots() {
        let h = harness();
        let m = h.started_match().await;
        h.to_voting(&m.id).await;

        assert!(matches!(
            h.state.cast_ballot(&m.id, "fan", "carol", 1.0).await,
            Err(MatchError::UnauthorizedParticipant(ref id)) if id == "carol"
        ));
        assert!(matches!(
            h.state.cast_ballot(&m.id, "alice", "alice", 1.0).await,
            Err(MatchError::UnauthorizedParticipant(ref id)) if id == "alice"
        ));
        for weight in [0.5, 3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                h.state.cast_ballot(&m.id, "fan", "bob", weight).await,
                Err(MatchError::InvalidWeight { .. })
            ));
        }
        assert!(h.state.get_match(&m.id).await.unwrap().ballots.is_empty());
    }

    #[tokio::test]
    async fn test_round_outcome_and_live_tallies() {
        let h = harness();
        let m = h.started_match().await;
        h.to_voting(&m.id).await;

        h.state.cast_ballot(&m.id, "v1", "alice", 1.5).await.unwrap();
        h.state.cast_ballot(&m.id, "v2", "bob", 1.0).await.unwrap();

        let live = h.state.live_tallies().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].1, 1);
        assert_eq!(live[0].2.verdict, Verdict::Winner("alice".to_string()));

        h.end_voting(&m.id).await;

        let outcome = h.state.round_outcome(&m.id, 1).await.unwrap();
        assert_eq!(outcome.power_of("alice"), 1.5);
        assert_eq!(outcome.power_of("bob"), 1.0);
        assert_eq!(outcome.ballots, 2);

        // Next round has started with no ballots yet
        let fresh = h.state.round_outcome(&m.id, 2).await.unwrap();
        assert_eq!(fresh.verdict, Verdict::Tie);
        assert_eq!(fresh.ballots, 0);

        assert!(matches!(
            h.state.round_outcome(&m.id, 3).await,
            Err(MatchError::InvalidRequest(_))
        ));
        assert!(h.state.live_tallies().await.is_empty());
    }

    #[tokio::test]
    async fn test_weight_comes_from_reputation() {
        let h = harness();
        let registry = ProfileRegistry::new();
        registry.set_spectator_elo("veteran", 1200).await;
        registry.set_spectator_elo("legend", 4000).await;

        let m = h.started_match().await;
        h.to_voting(&m.id).await;

        let veteran = h
            .state
            .cast_ballot_with_reputation(&registry, &m.id, "veteran", "alice")
            .await
            .unwrap();
        assert!((veteran.weight - 2.2).abs() < 1e-9);

        let legend = h
            .state
            .cast_ballot_with_reputation(&registry, &m.id, "legend", "bob")
            .await
            .unwrap();
        assert_eq!(legend.weight, 2.5);

        let newcomer = h
            .state
            .cast_ballot_with_reputation(&registry, &m.id, "newcomer", "bob")
            .await
            .unwrap();
        assert_eq!(newcomer.weight, 2.0);

        // Later rating changes do not touch accepted ballots
        registry.set_spectator_elo("veteran", 0).await;
        let m = h.state.get_match(&m.id).await.unwrap();
        assert!((m.ballots[0].weight - 2.2).abs() < 1e-9);
    }
}
