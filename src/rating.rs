//! ELO math for players and spectators.

use crate::game::WeightRange;
use serde::{Deserialize, Serialize};

/// K-factor for competitor rating changes
pub const ELO_K: f64 = 32.0;

/// Convert a spectator's rating into ballot weight: `1 + elo/1000`, clamped.
pub fn vote_power(spectator_elo: i32, range: &WeightRange) -> f64 {
    range.clamp(1.0 + f64::from(spectator_elo) / 1000.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EloChange {
    pub winner: i32,
    pub loser: i32,
}

pub fn elo_change(winner_elo: i32, loser_elo: i32) -> EloChange {
    let expected = |own: i32, other: i32| 1.0 / (1.0 + 10f64.powf(f64::from(other - own) / 400.0));
    let winner = (ELO_K * (1.0 - expected(winner_elo, loser_elo))).round() as i32;
    let loser = (ELO_K * (0.0 - expected(loser_elo, winner_elo))).round() as i32;
    EloChange { winner, loser }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    BronzeV,
    SilverIII,
    GoldII,
    PlatinumI,
    DiamondIII,
    Master,
    Grandmaster,
}

impl Rank {
    pub fn from_elo(elo: i32) -> Self {
        match elo {
            e if e >= 3000 => Rank::Grandmaster,
            e if e >= 2500 => Rank::Master,
            e if e >= 2000 => Rank::DiamondIII,
            e if e >= 1500 => Rank::PlatinumI,
            e if e >= 1200 => Rank::GoldII,
            e if e >= 1000 => Rank::SilverIII,
            _ => Rank::BronzeV,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Rank::BronzeV => "Bronze V",
            Rank::SilverIII => "Silver III",
            Rank::GoldII => "Gold II",
            Rank::PlatinumI => "Platinum I",
            Rank::DiamondIII => "Diamond III",
            Rank::Master => "Master",
            Rank::Grandmaster => "Grandmaster",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_power() {
        let range = WeightRange::new(1.0, 2.5);
        assert_eq!(vote_power(1000, &range), 2.0);
        assert_eq!(vote_power(500, &range), 1.5);
        assert_eq!(vote_power(4000, &range), 2.5);
        assert_eq!(vote_power(-300, &range), 1.0);
    }

    #[test]
    fn test_even_match_elo_change() {
        let change = elo_change(1000, 1000);
        assert_eq!(change, EloChange { winner: 16, loser: -16 });
    }

    #[test]
    fn test_upset_moves_more_points() {
        let upset = elo_change(800, 1200);
        let expected = elo_change(1200, 800);
        assert!(upset.winner > expected.winner);
        assert_eq!(upset.winner, 29);
        assert_eq!(expected.winner, 3);
    }

    #[test]
    fn test_rank_thresholds() {
        assert_eq!(Rank::from_elo(999), Rank::BronzeV);
        assert_eq!(Rank::from_elo(1000), Rank::SilverIII);
        assert_eq!(Rank::from_elo(1200).title(), "Gold II");
        assert_eq!(Rank::from_elo(3000), Rank::Grandmaster);
    }
}
