//! Conway's rule over a bounded board, and board diffing.
//!
//! Every function here is pure: the same input boards always produce the
//! same output. Neighbours that fall off the edge of the board are treated
//! as dead (no wraparound).

use eternal_types::{Board, Cell};

/// Offsets of the eight Moore-neighbourhood positions.
const NEIGHBOUR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Compute the next generation of `board`.
///
/// A live cell survives with two or three live neighbours; a dead cell
/// becomes live with exactly three. Every other cell is dead in the
/// result. The output has the same dimensions as the input.
pub fn next_generation(board: &Board) -> Board {
    let mut next = Board::new(board.rows(), board.cols());
    for cell in board.coordinates() {
        let alive = board.is_alive(cell.row(), cell.col());
        let survives = matches!(
            (alive, live_neighbours(board, cell)),
            (true, 2 | 3) | (false, 3)
        );
        if survives {
            let _ = next.set(cell.row(), cell.col(), true);
        }
    }
    next
}

/// Count live cells among the eight neighbours of `cell`.
pub fn live_neighbours(board: &Board, cell: Cell) -> u8 {
    let mut count: u8 = 0;
    for (dr, dc) in NEIGHBOUR_OFFSETS {
        let (Some(row), Some(col)) = (
            cell.row().checked_add_signed(dr),
            cell.col().checked_add_signed(dc),
        ) else {
            continue;
        };
        if board.is_alive(row, col) {
            count = count.saturating_add(1);
        }
    }
    count
}

/// Every coordinate whose state differs between `prev` and `curr`, in
/// row-major order.
///
/// # Panics
///
/// Panics if the boards have different dimensions. Boards never change
/// size during a run, so a mismatch is a programming error.
pub fn diff_flipped(prev: &Board, curr: &Board) -> Vec<Cell> {
    assert_eq!(
        prev.dimensions(),
        curr.dimensions(),
        "diff_flipped requires boards of identical dimensions"
    );
    curr.coordinates()
        .filter(|cell| prev.is_alive(cell.row(), cell.col()) != curr.is_alive(cell.row(), cell.col()))
        .collect()
}

/// The flip list that turns an all-dead board into `board`: every live
/// cell in row-major order.
pub fn diff_from_empty(board: &Board) -> Vec<Cell> {
    board.live_cells().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn board_with(rows: usize, cols: usize, live: &[(usize, usize)]) -> Board {
        let mut board = Board::new(rows, cols);
        for &(r, c) in live {
            board.set(r, c, true).unwrap();
        }
        board
    }

    #[test]
    fn dimensions_are_preserved() {
        let board = board_with(7, 3, &[(0, 0), (6, 2)]);
        assert_eq!(next_generation(&board).dimensions(), (7, 3));
    }

    #[test]
    fn next_generation_is_deterministic() {
        let board = board_with(6, 6, &[(1, 1), (1, 2), (2, 2), (3, 1), (4, 4)]);
        assert_eq!(next_generation(&board), next_generation(&board));
    }

    #[test]
    fn block_is_a_still_life() {
        let block = board_with(4, 4, &[(1, 1), (1, 2), (2, 1), (2, 2)]);
        assert_eq!(next_generation(&block), block);
    }

    #[test]
    fn blinker_has_period_two() {
        let horizontal = board_with(5, 5, &[(2, 1), (2, 2), (2, 3)]);
        let vertical = board_with(5, 5, &[(1, 2), (2, 2), (3, 2)]);

        let once = next_generation(&horizontal);
        assert_eq!(once, vertical);
        assert_eq!(next_generation(&once), horizontal);
    }

    #[test]
    fn dead_board_stays_dead() {
        let board = Board::new(8, 8);
        assert_eq!(next_generation(&board).population(), 0);
    }

    #[test]
    fn edges_do_not_wrap() {
        // On a torus the three corner cells would feed (0, 0); bounded, they don't.
        let board = board_with(4, 4, &[(3, 3), (3, 0), (0, 3)]);
        let next = next_generation(&board);
        assert!(!next.is_alive(0, 0));
        assert_eq!(live_neighbours(&board, Cell(0, 0)), 0);
    }

    #[test]
    fn diff_of_identical_boards_is_empty() {
        let board = board_with(5, 5, &[(0, 0), (2, 3)]);
        assert!(diff_flipped(&board, &board).is_empty());
    }

    #[test]
    fn diff_is_row_major_and_symmetric_in_size() {
        let a = board_with(3, 3, &[(2, 0), (0, 1)]);
        let b = board_with(3, 3, &[(0, 1), (1, 1), (0, 2)]);
        let forward = diff_flipped(&a, &b);
        assert_eq!(forward, vec![Cell(0, 2), Cell(1, 1), Cell(2, 0)]);
        assert_eq!(forward.len(), diff_flipped(&b, &a).len());
    }

    #[test]
    #[should_panic(expected = "identical dimensions")]
    fn diff_of_mismatched_boards_panics() {
        let _ = diff_flipped(&Board::new(2, 2), &Board::new(2, 3));
    }

    #[test]
    fn diff_from_empty_lists_live_cells() {
        let board = board_with(3, 3, &[(2, 2), (0, 0)]);
        assert_eq!(diff_from_empty(&board), vec![Cell(0, 0), Cell(2, 2)]);
        assert_eq!(
            diff_from_empty(&board),
            diff_flipped(&Board::new(3, 3), &board)
        );
    }
}
