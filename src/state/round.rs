use super::game::{enter_phase, finish};
use super::AppState;
use crate::config::TiePolicy;
use crate::error::{MatchError, MatchResult};
use crate::game::{select_next, tally, winning_line, Selection};
use crate::protocol::MatchEvent;
use crate::types::*;

impl AppState {
    /// Call the next category and open its production window. Finishes the
    /// match when nothing is left to call.
    pub(super) fn start_round(
        &self,
        next: &mut Match,
        events: &mut Vec<MatchEvent>,
    ) -> MatchResult<()> {
        let selection = self.with_rng(|rng| {
            select_next(
                &self.pool,
                &next.called,
                &next.boards[0],
                &next.boards[1],
                rng,
            )
        });

        match selection {
            Selection::Exhausted => {
                tracing::info!("Match {} has no categories left", next.id);
                finish(
                    next,
                    Phase::Finished,
                    None,
                    FinishReason::CategoriesExhausted,
                    events,
                )
            }
            Selection::Next(category) => {
                tracing::info!(
                    "Match {} round {}: calling '{}'",
                    next.id,
                    next.current_round_no(),
                    category
                );
                next.called.push(category.clone());
                next.current_category = Some(category);
                next.submitted.clear();
                let deadline = self.now() + self.config.production_duration();
                enter_phase(next, Phase::Production, Some(deadline), events)
            }
        }
    }

    /// Record that a competitor finished producing. Voting opens early once
    /// both have.
    pub async fn signal_submission_ready(
        &self,
        match_id: &str,
        player_id: &str,
    ) -> MatchResult<Match> {
        let slot = self.slot(match_id).await?;
        let mut current = slot.lock().await;

        if current.phase != Phase::Production {
            return Err(MatchError::InvalidPhase {
                phase: current.phase,
            });
        }
        if !current.is_participant(player_id) {
            return Err(MatchError::UnauthorizedParticipant(player_id.to_string()));
        }
        if current.submitted.contains(player_id) {
            return Ok(current.clone());
        }

        let mut next = current.clone();
        let mut events = Vec::new();
        next.submitted.insert(player_id.to_string());
        tracing::debug!("Player {} submitted in {}", player_id, match_id);

        if next.submitted.len() == next.players.len() {
            let deadline = self.now() + self.config.voting_duration();
            enter_phase(&mut next, Phase::Voting, Some(deadline), &mut events)?;
        }

        self.commit(&mut current, next, events).await?;
        Ok(current.clone())
    }

    /// Apply the match's deadline if it has elapsed. Returns whether the
    /// match moved.
    pub async fn advance_if_due(&self, match_id: &str) -> MatchResult<bool> {
        let slot = self.slot(match_id).await?;
        let mut current = slot.lock().await;

        let due = matches!(current.deadline, Some(deadline) if deadline <= self.now());
        if !due {
            return Ok(false);
        }

        let mut next = current.clone();
        let mut events = Vec::new();
        match current.phase {
            Phase::Production => {
                tracing::info!("Production window closed for {}", match_id);
                let deadline = self.now() + self.config.voting_duration();
                enter_phase(&mut next, Phase::Voting, Some(deadline), &mut events)?;
            }
            Phase::Voting => self.resolve_round(&mut next, &mut events)?,
            _ => return Ok(false),
        }

        self.commit(&mut current, next, events).await?;
        Ok(true)
    }

    /// Advance every live match whose deadline has elapsed.
    ///
    /// Failures are logged and left for the next sweep.
    pub async fn expire_deadlines(&self) -> Vec<MatchId> {
        let mut advanced = Vec::new();
        for match_id in self.live_match_ids().await {
            match self.advance_if_due(&match_id).await {
                Ok(true) => advanced.push(match_id),
                Ok(false) => {}
                // Archived between listing and locking
                Err(MatchError::InvalidPhase { .. }) => {}
                Err(e) => tracing::warn!("Deadline for {} not applied: {}", match_id, e),
            }
        }
        advanced
    }

    /// Close the vote, mark squares and decide whether the match goes on
    fn resolve_round(&self, next: &mut Match, events: &mut Vec<MatchEvent>) -> MatchResult<()> {
        enter_phase(next, Phase::Resolving, None, events)?;

        let round_no = next.current_round_no();
        let category = next
            .current_category
            .clone()
            .ok_or(MatchError::InvalidPhase {
                phase: Phase::Voting,
            })?;
        let result = tally(&next.players, next.ballots_for_round(round_no));

        let seats: Vec<usize> = match &result.verdict {
            Verdict::Winner(player_id) => next.seat_of(player_id).into_iter().collect(),
            Verdict::Tie => match self.config.tie_policy {
                TiePolicy::NoMark => Vec::new(),
                TiePolicy::MarkBoth => (0..next.players.len()).collect(),
            },
        };

        let mut marked = Vec::new();
        for seat in seats {
            if let Some(cell) = next.boards[seat].mark_category(&category) {
                marked.push(MarkedCell {
                    player_id: next.players[seat].clone(),
                    cell,
                });
            }
        }

        next.round += 1;
        tracing::info!(
            "Match {} round {} resolved: {:?} ({} ballots, {} marked)",
            next.id,
            next.round,
            result.verdict,
            result.ballots,
            marked.len()
        );
        next.history.push(RoundRecord {
            round: next.round,
            category: category.clone(),
            verdict: result.verdict.clone(),
            marked: marked.clone(),
            resolved_at: self.now(),
        });
        events.push(MatchEvent::RoundResolved {
            match_id: next.id.clone(),
            round: next.round,
            category,
            verdict: result.verdict,
            power: result.power,
            ballots: result.ballots,
            marked: marked.clone(),
        });

        // Only boards that changed this round can have a new line
        let bingos: Vec<PlayerId> = marked
            .iter()
            .filter(|mc| next.board_of(&mc.player_id).is_some_and(|b| b.has_bingo()))
            .map(|mc| mc.player_id.clone())
            .collect();

        match bingos.as_slice() {
            [] => self.start_round(next, events),
            [winner] => {
                if let Some(line) = next.board_of(winner).and_then(|b| winning_line(b.marked())) {
                    tracing::info!("Player {} completed {:?} in {}", winner, line, next.id);
                }
                finish(
                    next,
                    Phase::Finished,
                    Some(winner.clone()),
                    FinishReason::Bingo,
                    events,
                )
            }
            _ => finish(next, Phase::Finished, None, FinishReason::Draw, events),
        }
    }
}
