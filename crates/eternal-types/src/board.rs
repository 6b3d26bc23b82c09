//! The cell grid and its coordinates.
//!
//! A [`Board`] keeps its cells row-major in a single vector, so every row
//! has the same length by construction and the dimensions can never change
//! after creation. Out-of-range reads report dead; out-of-range writes are
//! rejected.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Errors raised when building a board from external data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// A row's length differs from the first row's length.
    #[error("ragged board: row {row} has {found} cells, expected {expected}")]
    Ragged {
        /// Index of the offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        found: usize,
    },

    /// The serialized cell vector does not match the declared dimensions.
    #[error("board declares {rows}x{cols} but carries {found} cells")]
    CellCount {
        /// Declared row count.
        rows: usize,
        /// Declared column count.
        cols: usize,
        /// Actual number of cells.
        found: usize,
    },

    /// The declared dimensions overflow `usize`.
    #[error("board dimensions {rows}x{cols} are too large")]
    TooLarge {
        /// Declared row count.
        rows: usize,
        /// Declared column count.
        cols: usize,
    },
}

/// A `(row, col)` coordinate. Serializes as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Cell(pub usize, pub usize);

impl Cell {
    /// Build a coordinate from a row and a column.
    pub const fn new(row: usize, col: usize) -> Self {
        Self(row, col)
    }

    /// Row index.
    pub const fn row(self) -> usize {
        self.0
    }

    /// Column index.
    pub const fn col(self) -> usize {
        self.1
    }
}

/// Rectangular grid of boolean cells; `true` means alive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BoardRepr")]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

/// Unvalidated wire form used while deserializing a [`Board`].
#[derive(Deserialize)]
struct BoardRepr {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl TryFrom<BoardRepr> for Board {
    type Error = BoardError;

    fn try_from(repr: BoardRepr) -> Result<Self, Self::Error> {
        let expected = repr
            .rows
            .checked_mul(repr.cols)
            .ok_or(BoardError::TooLarge {
                rows: repr.rows,
                cols: repr.cols,
            })?;
        if repr.cells.len() != expected {
            return Err(BoardError::CellCount {
                rows: repr.rows,
                cols: repr.cols,
                found: repr.cells.len(),
            });
        }
        Ok(Self {
            rows: repr.rows,
            cols: repr.cols,
            cells: repr.cells,
        })
    }
}

impl Board {
    /// Create an all-dead board of the given dimensions.
    ///
    /// Dimensions whose product overflows `usize` saturate to an empty
    /// board; configuration validation rejects such sizes long before
    /// they get here.
    pub fn new(rows: usize, cols: usize) -> Self {
        match rows.checked_mul(cols) {
            Some(len) => Self {
                rows,
                cols,
                cells: vec![false; len],
            },
            None => Self {
                rows: 0,
                cols: 0,
                cells: Vec::new(),
            },
        }
    }

    /// Build a board from nested rows.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Ragged`] if any row differs in length from
    /// the first.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, BoardError> {
        let cols = rows.first().map_or(0, Vec::len);
        let row_count = rows.len();
        let mut cells = Vec::with_capacity(row_count.saturating_mul(cols));
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(BoardError::Ragged {
                    row: index,
                    expected: cols,
                    found: row.len(),
                });
            }
            cells.extend(row);
        }
        Ok(Self {
            rows: row_count,
            cols,
            cells,
        })
    }

    /// Number of rows.
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)` pair, handy for dimension checks.
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Whether `(row, col)` lies on the board.
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        if !self.contains(row, col) {
            return None;
        }
        row.checked_mul(self.cols)?.checked_add(col)
    }

    /// Read a cell. Off-board coordinates read as dead.
    pub fn is_alive(&self, row: usize, col: usize) -> bool {
        self.offset(row, col)
            .and_then(|i| self.cells.get(i).copied())
            .unwrap_or(false)
    }

    /// Write a cell. Returns `Some(previous)` when the cell is on the
    /// board, `None` otherwise (the board is left untouched).
    pub fn set(&mut self, row: usize, col: usize, alive: bool) -> Option<bool> {
        let index = self.offset(row, col)?;
        let slot = self.cells.get_mut(index)?;
        let previous = *slot;
        *slot = alive;
        Some(previous)
    }

    /// Iterate over every coordinate in row-major order.
    pub fn coordinates(&self) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| Cell(row, col)))
    }

    /// Iterate over live cells in row-major order.
    pub fn live_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.coordinates()
            .zip(self.cells.iter())
            .filter_map(|(cell, alive)| alive.then_some(cell))
    }

    /// Number of live cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|alive| **alive).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_board_is_dead_with_fixed_dimensions() {
        let board = Board::new(3, 4);
        assert_eq!(board.dimensions(), (3, 4));
        assert_eq!(board.population(), 0);
        assert_eq!(board.coordinates().count(), 12);
    }

    #[test]
    fn set_reports_previous_value_and_rejects_off_board() {
        let mut board = Board::new(2, 2);
        assert_eq!(board.set(1, 1, true), Some(false));
        assert_eq!(board.set(1, 1, true), Some(true));
        assert_eq!(board.set(2, 0, true), None);
        assert!(board.is_alive(1, 1));
        assert!(!board.is_alive(5, 5));
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let result = Board::from_rows(vec![vec![true, false], vec![true]]);
        assert_eq!(
            result,
            Err(BoardError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn live_cells_are_row_major() {
        let board =
            Board::from_rows(vec![vec![false, true], vec![true, true]]).unwrap_or_default();
        let live: Vec<Cell> = board.live_cells().collect();
        assert_eq!(live, vec![Cell(0, 1), Cell(1, 0), Cell(1, 1)]);
    }

    #[test]
    fn deserialize_rejects_wrong_cell_count() {
        let json = r#"{"rows":2,"cols":2,"cells":[true,false,true]}"#;
        let result: Result<Board, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn cell_serializes_as_pair() {
        let json = serde_json::to_string(&Cell(5, 7)).ok();
        assert_eq!(json.as_deref(), Some("[5,7]"));
    }
}
