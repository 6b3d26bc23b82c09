//! Randomised cell activation: initial seeding and live splatters.
//!
//! All randomness is injected through `&mut impl Rng` so callers control
//! the source (an OS-seeded generator in production, a fixed seed in
//! tests).

use eternal_types::{Board, Cell};
use rand::Rng;
use rand::seq::index;
use serde::Deserialize;

use crate::error::GridError;

/// Parameters for seeding a fresh board with organic clusters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedConfig {
    /// Fewest clusters to place.
    #[serde(default = "default_min_clusters")]
    pub min_clusters: u32,

    /// Most clusters to place.
    #[serde(default = "default_max_clusters")]
    pub max_clusters: u32,

    /// Smallest cluster radius.
    #[serde(default = "default_min_radius")]
    pub min_radius: u32,

    /// Largest cluster radius.
    #[serde(default = "default_max_radius")]
    pub max_radius: u32,

    /// Probability that a cell inside a cluster is activated.
    #[serde(default = "default_density")]
    pub density: f64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            min_clusters: default_min_clusters(),
            max_clusters: default_max_clusters(),
            min_radius: default_min_radius(),
            max_radius: default_max_radius(),
            density: default_density(),
        }
    }
}

const fn default_min_clusters() -> u32 {
    5
}

const fn default_max_clusters() -> u32 {
    12
}

const fn default_min_radius() -> u32 {
    2
}

const fn default_max_radius() -> u32 {
    5
}

const fn default_density() -> f64 {
    0.6
}

/// All on-board cells within Euclidean distance `radius` of
/// `(row, col)`, in row-major order. The centre itself may be off-board.
///
/// Only the part of the bounding square that overlaps the board is
/// scanned, so the cost is bounded by the board size whatever the radius.
pub fn cells_within(board: &Board, row: i64, col: i64, radius: u32) -> Vec<Cell> {
    let r = i64::from(radius);
    let r_squared = r.saturating_mul(r);
    let Some((row_lo, row_hi)) = clip_span(row, r, board.rows()) else {
        return Vec::new();
    };
    let Some((col_lo, col_hi)) = clip_span(col, r, board.cols()) else {
        return Vec::new();
    };

    let mut cells = Vec::new();
    for cell_row in row_lo..=row_hi {
        let dr = cell_row.saturating_sub(row);
        for cell_col in col_lo..=col_hi {
            let dc = cell_col.saturating_sub(col);
            if dr.saturating_mul(dr).saturating_add(dc.saturating_mul(dc)) > r_squared {
                continue;
            }
            if let (Ok(cell_row), Ok(cell_col)) =
                (usize::try_from(cell_row), usize::try_from(cell_col))
            {
                cells.push(Cell(cell_row, cell_col));
            }
        }
    }
    cells
}

/// `[center - r, center + r]` intersected with `[0, len)`, or `None` when
/// they do not overlap.
fn clip_span(center: i64, r: i64, len: usize) -> Option<(i64, i64)> {
    let last = i64::try_from(len).unwrap_or(i64::MAX).checked_sub(1)?;
    let lo = center.saturating_sub(r).max(0);
    let hi = center.saturating_add(r).min(last);
    (lo <= hi).then_some((lo, hi))
}

/// Activate each on-board cell within `radius` of `center` with
/// probability `density`. Returns how many cells went from dead to alive.
///
/// # Errors
///
/// Returns [`GridError::InvalidDensity`] if `density` is not in `[0, 1]`.
pub fn random_cluster(
    board: &mut Board,
    center: Cell,
    radius: u32,
    density: f64,
    rng: &mut impl Rng,
) -> Result<usize, GridError> {
    if !(0.0..=1.0).contains(&density) {
        return Err(GridError::InvalidDensity(density));
    }
    let row = i64::try_from(center.row()).unwrap_or(i64::MAX);
    let col = i64::try_from(center.col()).unwrap_or(i64::MAX);

    let mut activated: usize = 0;
    for cell in cells_within(board, row, col, radius) {
        if rng.random_bool(density) && board.set(cell.row(), cell.col(), true) == Some(false) {
            activated = activated.saturating_add(1);
        }
    }
    Ok(activated)
}

/// Build a fresh `rows x cols` board populated by a random number of
/// clusters scattered over the whole board.
///
/// # Errors
///
/// Returns [`GridError::InvalidRange`] if a min/max pair is inverted, or
/// [`GridError::InvalidDensity`] if the density is not a probability.
pub fn seed_board(
    rows: usize,
    cols: usize,
    config: &SeedConfig,
    rng: &mut impl Rng,
) -> Result<Board, GridError> {
    check_range("clusters", config.min_clusters, config.max_clusters)?;
    check_range("radius", config.min_radius, config.max_radius)?;

    let mut board = Board::new(rows, cols);
    if board.rows() == 0 || board.cols() == 0 {
        return Ok(board);
    }

    let clusters = rng.random_range(config.min_clusters..=config.max_clusters);
    for _ in 0..clusters {
        let center = Cell(rng.random_range(0..rows), rng.random_range(0..cols));
        let radius = rng.random_range(config.min_radius..=config.max_radius);
        random_cluster(&mut board, center, radius, config.density, rng)?;
    }

    tracing::debug!(rows, cols, clusters, population = board.population(), "Seeded board");
    Ok(board)
}

const fn check_range(field: &'static str, min: u32, max: u32) -> Result<(), GridError> {
    if min > max {
        return Err(GridError::InvalidRange { field, min, max });
    }
    Ok(())
}

/// Default number of cells a splatter activates: half the candidates,
/// rounded up.
pub const fn default_splatter_count(candidates: usize) -> usize {
    candidates.div_ceil(2)
}

/// Splatter live cells around `(row, col)`.
///
/// Candidates are every on-board cell within Euclidean distance `radius`
/// of the origin, gathered once; `count` of them (clamped to the candidate
/// count, defaulting to [`default_splatter_count`]) are drawn without
/// replacement and set alive. The origin is always alive afterwards.
///
/// Returns exactly the cells that changed state, in row-major order.
///
/// # Errors
///
/// Returns [`GridError::OriginOutOfBounds`] if the origin is off the board.
pub fn splatter(
    board: &mut Board,
    row: i64,
    col: i64,
    radius: u32,
    count: Option<usize>,
    rng: &mut impl Rng,
) -> Result<Vec<Cell>, GridError> {
    let origin = match (usize::try_from(row), usize::try_from(col)) {
        (Ok(r), Ok(c)) if board.contains(r, c) => Cell(r, c),
        _ => {
            return Err(GridError::OriginOutOfBounds {
                row,
                col,
                rows: board.rows(),
                cols: board.cols(),
            });
        }
    };

    let candidates = cells_within(board, row, col, radius);
    let amount = count
        .unwrap_or_else(|| default_splatter_count(candidates.len()))
        .min(candidates.len());

    let mut flipped = Vec::with_capacity(amount.saturating_add(1));
    for chosen in index::sample(rng, candidates.len(), amount) {
        if let Some(&cell) = candidates.get(chosen) {
            if board.set(cell.row(), cell.col(), true) == Some(false) {
                flipped.push(cell);
            }
        }
    }
    if board.set(origin.row(), origin.col(), true) == Some(false) {
        flipped.push(origin);
    }

    flipped.sort_unstable();
    Ok(flipped)
}
