//! Player and spectator profiles: ratings, records and the reputation used
//! to weight ballots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::rating::{elo_change, EloChange, Rank};
use crate::types::{MatchId, PlayerId, VoterId};

pub const DEFAULT_COMPETITOR_ELO: i32 = 500;
pub const DEFAULT_SPECTATOR_ELO: i32 = 1000;
pub const DEFAULT_COINS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub competitor_elo: i32,
    pub spectator_elo: i32,
    pub wins: u32,
    pub losses: u32,
    /// Ballots cast for the player who went on to win the round
    pub correct_votes: u32,
    pub coins: u32,
}

impl PlayerProfile {
    pub fn new(id: impl Into<PlayerId>) -> Self {
        Self {
            id: id.into(),
            competitor_elo: DEFAULT_COMPETITOR_ELO,
            spectator_elo: DEFAULT_SPECTATOR_ELO,
            wins: 0,
            losses: 0,
            correct_votes: 0,
            coins: DEFAULT_COINS,
        }
    }

    pub fn rank(&self) -> Rank {
        Rank::from_elo(self.competitor_elo)
    }
}

/// Where ballot weights come from: a spectator's rating at cast time
#[async_trait]
pub trait ReputationSource: Send + Sync {
    async fn spectator_elo(&self, voter_id: &str) -> i32;
}

#[derive(Debug, Default)]
struct Ledger {
    profiles: HashMap<PlayerId, PlayerProfile>,
    /// Matches already applied to competitor records
    rated_matches: HashSet<MatchId>,
    /// Rounds whose winning backers were already credited
    credited_rounds: HashSet<(MatchId, u32)>,
}

impl Ledger {
    fn entry(&mut self, id: &str) -> &mut PlayerProfile {
        self.profiles
            .entry(id.to_string())
            .or_insert_with(|| PlayerProfile::new(id))
    }
}

/// In-memory profile table, created lazily on first use.
///
/// Match and round results are applied at most once per match id and round,
/// so replaying history after missed events never double counts.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    ledger: RwLock<Ledger>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<PlayerProfile> {
        self.ledger.read().await.profiles.get(id).cloned()
    }

    pub async fn get_or_create(&self, id: &str) -> PlayerProfile {
        self.ledger.write().await.entry(id).clone()
    }

    pub async fn set_spectator_elo(&self, id: &str, elo: i32) {
        self.ledger.write().await.entry(id).spectator_elo = elo;
    }

    /// Apply a decided match to both competitors' records. `None` when the
    /// match was already applied.
    pub async fn record_match(
        &self,
        match_id: &str,
        winner: &str,
        loser: &str,
    ) -> Option<EloChange> {
        let mut ledger = self.ledger.write().await;
        if !ledger.rated_matches.insert(match_id.to_string()) {
            return None;
        }

        let winner_elo = ledger.entry(winner).competitor_elo;
        let loser_elo = ledger.entry(loser).competitor_elo;
        let change = elo_change(winner_elo, loser_elo);

        let w = ledger.entry(winner);
        w.competitor_elo += change.winner;
        w.wins += 1;
        let l = ledger.entry(loser);
        l.competitor_elo += change.loser;
        l.losses += 1;

        tracing::info!(
            "Rating after {}: {} {:+}, {} {:+}",
            match_id,
            winner,
            change.winner,
            loser,
            change.loser
        );
        Some(change)
    }

    /// Credit the voters who backed a round's winner. Returns false when the
    /// round was already credited.
    pub async fn credit_round<'a>(
        &self,
        match_id: &str,
        round: u32,
        voters: impl IntoIterator<Item = &'a VoterId>,
    ) -> bool {
        let mut ledger = self.ledger.write().await;
        if !ledger
            .credited_rounds
            .insert((match_id.to_string(), round))
        {
            return false;
        }
        for voter in voters {
            ledger.entry(voter).correct_votes += 1;
        }
        true
    }
}

#[async_trait]
impl ReputationSource for ProfileRegistry {
    async fn spectator_elo(&self, voter_id: &str) -> i32 {
        self.get(voter_id)
            .await
            .map(|p| p.spectator_elo)
            .unwrap_or(DEFAULT_SPECTATOR_ELO)
    }
}
