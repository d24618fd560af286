use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::pool::CategoryPool;
use super::win;
use crate::error::{MatchError, MatchResult};
use crate::types::{Category, Cell};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Square {
    Free,
    Category(Category),
}

/// A player's card: a size×size grid of squares plus the parallel marked grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    size: usize,
    squares: Vec<Vec<Square>>,
    marked: Vec<Vec<bool>>,
}

impl Board {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn squares(&self) -> &[Vec<Square>] {
        &self.squares
    }

    pub fn marked(&self) -> &[Vec<bool>] {
        &self.marked
    }

    pub fn square(&self, cell: Cell) -> Option<&Square> {
        self.squares.get(cell.row)?.get(cell.col)
    }

    pub fn is_marked(&self, cell: Cell) -> bool {
        self.marked
            .get(cell.row)
            .and_then(|row| row.get(cell.col))
            .copied()
            .unwrap_or(false)
    }

    pub fn free_cell(&self) -> Option<Cell> {
        self.cells().find(|&c| self.square(c) == Some(&Square::Free))
    }

    /// Categories on this board in row-major order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.squares.iter().flatten().filter_map(|sq| match sq {
            Square::Category(label) => Some(label.as_str()),
            Square::Free => None,
        })
    }

    pub fn contains(&self, category: &str) -> bool {
        self.find(category).is_some()
    }

    pub fn find(&self, category: &str) -> Option<Cell> {
        self.cells()
            .find(|&c| matches!(self.square(c), Some(Square::Category(l)) if l == category))
    }

    /// Mark the square holding `category`. Returns the cell if the category is
    /// on this board, `None` otherwise (a valid no-op).
    pub fn mark_category(&mut self, category: &str) -> Option<Cell> {
        let cell = self.find(category)?;
        self.marked[cell.row][cell.col] = true;
        Some(cell)
    }

    pub fn has_bingo(&self) -> bool {
        win::has_win(&self.marked)
    }

    pub fn marked_count(&self) -> usize {
        self.marked.iter().flatten().filter(|m| **m).count()
    }

    fn cells(&self) -> impl Iterator<Item = Cell> {
        let size = self.size;
        (0..size).flat_map(move |row| (0..size).map(move |col| Cell::new(row, col)))
    }
}

/// Number of category labels a `size`x`size` board consumes
pub fn labels_required(size: usize, free_cell: Option<Cell>) -> MatchResult<usize> {
    size.checked_mul(size)
        .map(|cells| cells.saturating_sub(usize::from(free_cell.is_some())))
        .ok_or_else(|| MatchError::Config(format!("Board size {} is too large", size)))
}

/// Build a board from `pool`, drawing labels uniformly without replacement.
///
/// Labels are placed row-major, skipping `free_cell` which starts marked.
pub fn generate_board(
    pool: &CategoryPool,
    size: usize,
    free_cell: Option<Cell>,
    rng: &mut impl Rng,
) -> MatchResult<Board> {
    if size == 0 {
        return Err(MatchError::Config("Board size must be positive".to_string()));
    }
    if let Some(free) = free_cell {
        if free.row >= size || free.col >= size {
            return Err(MatchError::Config(format!(
                "Free cell ({}, {}) lies outside a {}x{} board",
                free.row, free.col, size, size
            )));
        }
    }

    let required = labels_required(size, free_cell)?;
    if pool.len() < required {
        return Err(MatchError::InsufficientPool {
            available: pool.len(),
            required,
        });
    }

    let mut labels = pool.labels().to_vec();
    labels.shuffle(rng);
    let mut drawn = labels.into_iter().take(required);

    let mut squares = Vec::with_capacity(size);
    let mut marked = Vec::with_capacity(size);
    for row in 0..size {
        let mut square_row = Vec::with_capacity(size);
        let mut marked_row = Vec::with_capacity(size);
        for col in 0..size {
            if free_cell == Some(Cell::new(row, col)) {
                square_row.push(Square::Free);
                marked_row.push(true);
            } else {
                // `required` labels were drawn for exactly these squares
                let label = drawn.next().ok_or(MatchError::InsufficientPool {
                    available: pool.len(),
                    required,
                })?;
                square_row.push(Square::Category(label));
                marked_row.push(false);
            }
        }
        squares.push(square_row);
        marked.push(marked_row);
    }

    Ok(Board {
        size,
        squares,
        marked,
    })
}
