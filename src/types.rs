use crate::game::Board;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque ID types for type safety
pub type MatchId = String;
pub type PlayerId = String;
pub type VoterId = String;
pub type Category = String;

/// Seats in a match
pub const SEATS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Production,
    Voting,
    /// Transient: only exists while a voting deadline is being processed
    Resolving,
    Finished,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Cancelled)
    }
}

/// Row/column coordinate on a board
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// One spectator's vote. The weight is frozen when the ballot is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ballot {
    pub match_id: MatchId,
    pub round: u32,
    pub voter_id: VoterId,
    pub player_id: PlayerId,
    pub weight: f64,
    pub cast_at: DateTime<Utc>,
}

/// Outcome of a single round's vote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Winner(PlayerId),
    Tie,
}

impl Verdict {
    pub fn winner(&self) -> Option<&PlayerId> {
        match self {
            Verdict::Winner(id) => Some(id),
            Verdict::Tie => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkedCell {
    pub player_id: PlayerId,
    pub cell: Cell,
}

/// What happened in a resolved round. Vote totals are not stored here;
/// they are recomputed from the round's ballots on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    pub round: u32,
    pub category: Category,
    pub verdict: Verdict,
    pub marked: Vec<MarkedCell>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinishReason {
    /// A player completed a line
    Bingo,
    /// No category left to call
    CategoriesExhausted,
    /// Both players completed a line in the same round
    Draw,
    Cancelled { reason: String },
}

/// The match aggregate. Only the state machine in [`crate::state`] mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub version: u64,
    /// Seated players in seat order. A match opened without an opponent has
    /// one entry until someone joins.
    pub players: Vec<PlayerId>,
    /// One board per seat, dealt at creation
    pub boards: [Board; SEATS],
    pub called: Vec<Category>,
    pub current_category: Option<Category>,
    pub phase: Phase,
    /// Number of completed rounds
    pub round: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub winner: Option<PlayerId>,
    pub finish_reason: Option<FinishReason>,
    pub ready: BTreeSet<PlayerId>,
    pub submitted: BTreeSet<PlayerId>,
    pub ballots: Vec<Ballot>,
    pub history: Vec<RoundRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    /// Index of the player in `players`/`boards`
    pub fn seat_of(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p == player_id)
    }

    pub fn is_participant(&self, player_id: &str) -> bool {
        self.seat_of(player_id).is_some()
    }

    /// Whether every seat is taken
    pub fn is_full(&self) -> bool {
        self.players.len() == SEATS
    }

    pub fn board_of(&self, player_id: &str) -> Option<&Board> {
        self.seat_of(player_id).map(|seat| &self.boards[seat])
    }

    /// 1-based number of the round currently being played
    pub fn current_round_no(&self) -> u32 {
        self.round + 1
    }

    pub fn ballots_for_round(&self, round: u32) -> impl Iterator<Item = &Ballot> {
        self.ballots.iter().filter(move |b| b.round == round)
    }

    pub fn has_voted(&self, voter_id: &str, round: u32) -> bool {
        self.ballots_for_round(round).any(|b| b.voter_id == voter_id)
    }
}

/// Lobby view of a match, without boards or ballots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchSummary {
    pub id: MatchId,
    pub players: Vec<PlayerId>,
    pub open_seat: bool,
    pub phase: Phase,
    pub round: u32,
    pub current_category: Option<Category>,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Match> for MatchSummary {
    fn from(m: &Match) -> Self {
        Self {
            id: m.id.clone(),
            players: m.players.clone(),
            open_seat: !m.is_full(),
            phase: m.phase,
            round: m.round,
            current_category: m.current_category.clone(),
            deadline: m.deadline,
            created_at: m.created_at,
        }
    }
}
