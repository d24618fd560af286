use crate::game::RoundTally;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Without `player_b` the second seat stays open for a `join_match`
    CreateMatch {
        player_a: PlayerId,
        #[serde(default)]
        player_b: Option<PlayerId>,
    },
    JoinMatch {
        match_id: MatchId,
    },
    ListMatches,
    /// Competitor is ready to start
    Ready {
        match_id: MatchId,
    },
    /// Competitor finished producing for the current round
    SubmissionReady {
        match_id: MatchId,
    },
    /// Spectator ballot. The weight is derived server-side from the voter's rating.
    Vote {
        match_id: MatchId,
        player_id: PlayerId,
        msg_id: String,
    },
    Cancel {
        match_id: MatchId,
        reason: String,
    },
    GetMatch {
        match_id: MatchId,
    },
}

/// Events emitted by the match state machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum MatchEvent {
    PhaseChanged {
        match_id: MatchId,
        from: Phase,
        to: Phase,
        round: u32,
        deadline: Option<DateTime<Utc>>,
    },
    RoundResolved {
        match_id: MatchId,
        round: u32,
        category: Category,
        verdict: Verdict,
        power: BTreeMap<PlayerId, f64>,
        ballots: usize,
        /// Empty on a tie or when the category was not on the winner's board
        marked: Vec<MarkedCell>,
    },
    MatchFinished {
        match_id: MatchId,
        winner: Option<PlayerId>,
        reason: FinishReason,
    },
}

impl MatchEvent {
    pub fn match_id(&self) -> &MatchId {
        match self {
            MatchEvent::PhaseChanged { match_id, .. }
            | MatchEvent::RoundResolved { match_id, .. }
            | MatchEvent::MatchFinished { match_id, .. } => match_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        user_id: Option<String>,
        server_now: String,
    },
    MatchState {
        #[serde(rename = "match")]
        state: Box<Match>,
    },
    Ack,
    MatchList {
        matches: Vec<MatchSummary>,
    },
    VoteAck {
        msg_id: String,
        weight: f64,
    },
    Event {
        event: MatchEvent,
    },
    /// Live weighted totals while a match is voting
    VoteProgress {
        match_id: MatchId,
        round: u32,
        tally: RoundTally,
        seq: u64,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<&crate::error::MatchError> for ServerMessage {
    fn from(err: &crate::error::MatchError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}
