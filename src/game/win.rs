//! Bingo line detection.

use serde::{Deserialize, Serialize};

/// A completed line on a board
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Line {
    Row(usize),
    Column(usize),
    Diagonal,
    AntiDiagonal,
}

/// True iff a row, a column or either diagonal is fully marked.
pub fn has_win(marked: &[Vec<bool>]) -> bool {
    winning_line(marked).is_some()
}

/// The first fully marked line, checking rows, columns, then diagonals.
pub fn winning_line(marked: &[Vec<bool>]) -> Option<Line> {
    let size = marked.len();
    if size == 0 {
        return None;
    }
    let at = |row: usize, col: usize| -> bool {
        marked
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    };

    if let Some(row) = (0..size).find(|&r| (0..size).all(|c| at(r, c))) {
        return Some(Line::Row(row));
    }
    if let Some(col) = (0..size).find(|&c| (0..size).all(|r| at(r, c))) {
        return Some(Line::Column(col));
    }
    if (0..size).all(|i| at(i, i)) {
        return Some(Line::Diagonal);
    }
    if (0..size).all(|i| at(i, size - 1 - i)) {
        return Some(Line::AntiDiagonal);
    }
    None
}
