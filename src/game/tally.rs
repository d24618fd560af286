use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MatchError, MatchResult};
use crate::types::{Ballot, PlayerId, Verdict};

/// Weighted vote totals for one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundTally {
    pub power: BTreeMap<PlayerId, f64>,
    pub ballots: usize,
    pub verdict: Verdict,
}

impl RoundTally {
    pub fn power_of(&self, player_id: &str) -> f64 {
        self.power.get(player_id).copied().unwrap_or(0.0)
    }
}

/// Sum ballot weights per chosen player.
///
/// Every contestant appears in `power`, with 0.0 if nobody backed them. The
/// winner must have strictly more power than everyone else, otherwise the
/// verdict is `Tie`.
pub fn tally<'a, I>(contestants: &[PlayerId], ballots: I) -> RoundTally
where
    I: IntoIterator<Item = &'a Ballot>,
{
    let mut power: BTreeMap<PlayerId, f64> =
        contestants.iter().map(|p| (p.clone(), 0.0)).collect();
    let mut count = 0;

    // Sum in voter order so the float total does not depend on arrival order
    let mut ballots: Vec<&Ballot> = ballots.into_iter().collect();
    ballots.sort_by(|a, b| a.voter_id.cmp(&b.voter_id));
    for ballot in ballots {
        *power.entry(ballot.player_id.clone()).or_insert(0.0) += ballot.weight;
        count += 1;
    }

    let verdict = leader(&power)
        .map(Verdict::Winner)
        .unwrap_or(Verdict::Tie);

    RoundTally {
        power,
        ballots: count,
        verdict,
    }
}

fn leader(power: &BTreeMap<PlayerId, f64>) -> Option<PlayerId> {
    let (best_id, best) = power
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(id, p)| (id, *p))?;

    let contested = power
        .iter()
        .any(|(id, p)| id != best_id && *p >= best);
    if contested {
        None
    } else {
        Some(best_id.clone())
    }
}

/// Accepted range for a ballot's weight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeightRange {
    pub min: f64,
    pub max: f64,
}

impl WeightRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Reject weights outside the range (NaN and infinities included)
    pub fn validate(&self, weight: f64) -> MatchResult<f64> {
        if weight.is_finite() && weight >= self.min && weight <= self.max {
            Ok(weight)
        } else {
            Err(MatchError::InvalidWeight {
                weight,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Pull a derived weight into range before it is submitted
    pub fn clamp(&self, weight: f64) -> f64 {
        if weight.is_nan() {
            self.min
        } else {
            weight.clamp(self.min, self.max)
        }
    }
}

impl Default for WeightRange {
    fn default() -> Self {
        Self::new(1.0, 2.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ballot(voter: &str, player: &str, weight: f64) -> Ballot {
        Ballot {
            match_id: "m".to_string(),
            round: 1,
            voter_id: voter.to_string(),
            player_id: player.to_string(),
            weight,
            cast_at: Utc::now(),
        }
    }

    fn contestants() -> Vec<PlayerId> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_equal_power_is_a_tie() {
        let ballots = vec![ballot("v1", "A", 1.0), ballot("v2", "B", 1.0)];
        let result = tally(&contestants(), &ballots);
        assert_eq!(result.verdict, Verdict::Tie);
        assert_eq!(result.ballots, 2);
    }

    #[test]
    fn test_strictly_greater_power_wins() {
        let ballots = vec![ballot("v1", "A", 1.5), ballot("v2", "B", 1.0)];
        let result = tally(&contestants(), &ballots);

        assert_eq!(result.verdict, Verdict::Winner("A".to_string()));
        assert_eq!(result.power_of("A"), 1.5);
        assert_eq!(result.power_of("B"), 1.0);
        assert_eq!(result.power.len(), 2);
    }

    #[test]
    fn test_no_ballots_is_a_tie_with_zero_totals() {
        let result = tally(&contestants(), std::iter::empty());
        assert_eq!(result.verdict, Verdict::Tie);
        assert_eq!(result.ballots, 0);
        assert_eq!(result.power_of("A"), 0.0);
        assert_eq!(result.power_of("B"), 0.0);
    }

    #[test]
    fn test_weight_beats_headcount() {
        // Two light voters lose to one heavy voter
        let ballots = vec![
            ballot("v1", "A", 1.0),
            ballot("v2", "A", 1.0),
            ballot("v3", "B", 2.5),
        ];
        let result = tally(&contestants(), &ballots);
        assert_eq!(result.verdict, Verdict::Winner("B".to_string()));
    }

    #[test]
    fn test_weight_range() {
        let range = WeightRange::new(1.0, 2.5);
        assert_eq!(range.validate(1.0).unwrap(), 1.0);
        assert_eq!(range.validate(2.5).unwrap(), 2.5);
        assert!(matches!(
            range.validate(2.6),
            Err(MatchError::InvalidWeight { .. })
        ));
        assert!(range.validate(f64::NAN).is_err());
        assert!(range.validate(f64::INFINITY).is_err());

        assert_eq!(range.clamp(9.0), 2.5);
        assert_eq!(range.clamp(0.2), 1.0);
    }
}
