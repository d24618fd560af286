use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashSet};

use super::board::Board;
use super::pool::CategoryPool;
use crate::types::Category;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Next(Category),
    /// Nothing left to call; the match cannot continue
    Exhausted,
}

/// Draw the next category to call.
///
/// Categories present on either board and not yet called are preferred.
/// When none remain, any uncalled pool category is drawn instead.
pub fn select_next(
    pool: &CategoryPool,
    called: &[Category],
    board_a: &Board,
    board_b: &Board,
    rng: &mut impl Rng,
) -> Selection {
    let called: HashSet<&str> = called.iter().map(String::as_str).collect();

    // BTreeSet keeps candidate order stable so seeded draws are reproducible
    let playable: Vec<&str> = board_a
        .categories()
        .chain(board_b.categories())
        .filter(|c| !called.contains(c))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if let Some(category) = playable.choose(rng) {
        return Selection::Next(category.to_string());
    }

    let remaining: Vec<&str> = pool
        .labels()
        .iter()
        .map(String::as_str)
        .filter(|c| !called.contains(c))
        .collect();

    match remaining.choose(rng) {
        Some(category) => Selection::Next(category.to_string()),
        None => Selection::Exhausted,
    }
}
