//! Runtime configuration read from the environment (and `.env`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MatchError, MatchResult};
use crate::game::{labels_required, CategoryPool, WeightRange};
use crate::types::{Cell, PlayerId};

/// What happens when a round's vote ends level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Nobody marks; the category is still consumed
    NoMark,
    /// Both players mark the category if it is on their board
    MarkBoth,
}

impl FromStr for TiePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_mark" => Ok(TiePolicy::NoMark),
            "mark_both" => Ok(TiePolicy::MarkBoth),
            other => Err(format!("unknown tie policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    pub board_size: usize,
    pub free_cell: Option<Cell>,
    pub production_seconds: u32,
    pub voting_seconds: u32,
    pub weights: WeightRange,
    pub tie_policy: TiePolicy,
    /// Accounts allowed to cancel any match
    #[serde(default)]
    pub operators: Vec<PlayerId>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            board_size: 5,
            free_cell: Some(Cell::new(2, 2)),
            production_seconds: 30 * 60,
            voting_seconds: 5 * 60,
            weights: WeightRange::default(),
            tie_policy: TiePolicy::NoMark,
            operators: Vec::new(),
        }
    }
}

impl MatchConfig {
    /// Read `BINGO_*` variables, falling back to defaults for anything unset
    /// or unparsable
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let board_size = env_parse("BINGO_BOARD_SIZE").unwrap_or(defaults.board_size);
        let free_cell = match std::env::var("BINGO_FREE_CELL") {
            Ok(v) if v.trim().eq_ignore_ascii_case("none") => None,
            Ok(v) => parse_cell(&v).or_else(|| {
                tracing::warn!("BINGO_FREE_CELL must be 'row,col' or 'none', got '{}'", v);
                Some(centre(board_size))
            }),
            Err(_) => Some(centre(board_size)),
        };

        Self {
            board_size,
            free_cell,
            production_seconds: env_parse("BINGO_PRODUCTION_SECONDS")
                .unwrap_or(defaults.production_seconds),
            voting_seconds: env_parse("BINGO_VOTING_SECONDS").unwrap_or(defaults.voting_seconds),
            weights: WeightRange::new(
                env_parse("BINGO_MIN_WEIGHT").unwrap_or(defaults.weights.min),
                env_parse("BINGO_MAX_WEIGHT").unwrap_or(defaults.weights.max),
            ),
            tie_policy: env_parse("BINGO_TIE_POLICY").unwrap_or(defaults.tie_policy),
            operators: std::env::var("BINGO_OPERATORS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
        }
    }

    /// Check the settings against the category pool they will be used with
    pub fn validate(&self, pool: &CategoryPool) -> MatchResult<()> {
        if self.board_size == 0 {
            return Err(MatchError::Config("board size must be positive".to_string()));
        }
        if let Some(cell) = self.free_cell {
            if cell.row >= self.board_size || cell.col >= self.board_size {
                return Err(MatchError::Config(format!(
                    "free cell ({}, {}) is outside the board",
                    cell.row, cell.col
                )));
            }
        }
        let required = labels_required(self.board_size, self.free_cell)?;
        if pool.len() < required {
            return Err(MatchError::InsufficientPool {
                available: pool.len(),
                required,
            });
        }
        if !(self.weights.min.is_finite() && self.weights.max.is_finite())
            || self.weights.min > self.weights.max
        {
            return Err(MatchError::Config(format!(
                "weight range [{}, {}] is invalid",
                self.weights.min, self.weights.max
            )));
        }
        if self.production_seconds == 0 || self.voting_seconds == 0 {
            return Err(MatchError::Config(
                "phase durations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_operator(&self, id: &str) -> bool {
        self.operators.iter().any(|op| op == id)
    }

    pub fn production_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.production_seconds))
    }

    pub fn voting_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.voting_seconds))
    }
}

/// Process-level settings for the binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory for the JSON match store; in-memory when unset
    pub data_dir: Option<PathBuf>,
    pub deadline_tick: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("BINGO_DATA_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if data_dir.is_none() {
            tracing::warn!("BINGO_DATA_DIR not set - matches are kept in memory only");
        }

        Self {
            port: env_parse("BINGO_PORT").unwrap_or(6573),
            data_dir,
            deadline_tick: Duration::from_millis(env_parse("BINGO_DEADLINE_TICK_MS").unwrap_or(500)),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}='{}'", key, raw);
            None
        }
    }
}

fn parse_cell(raw: &str) -> Option<Cell> {
    let (row, col) = raw.split_once(',')?;
    Some(Cell::new(row.trim().parse().ok()?, col.trim().parse().ok()?))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn centre(size: usize) -> Cell {
    Cell::new(size / 2, size / 2)
}
