//! One-shot point counts for small auxiliary datasets.

use crime_grid_spatial::{CellId, CellIndex};
use geo::Point;

/// Number of points per cell, zero-filled for every cell of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCounts {
    counts: Vec<u64>,
    outside: u64,
}

impl PointCounts {
    /// Counts indexed by `cell_id`.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub fn get(&self, cell_id: CellId) -> u64 {
        self.counts.get(cell_id).copied().unwrap_or(0)
    }

    /// Points that fell outside every cell.
    #[must_use]
    pub const fn outside(&self) -> u64 {
        self.outside
    }

    /// Points that landed in a cell.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Classifies every point and counts the hits per cell.
#[must_use]
pub fn count_points(points: &[Point<f64>], index: &CellIndex<'_>) -> PointCounts {
    let mut counts = vec![0_u64; index.grid().len()];
    let mut outside = 0_u64;

    for &point in points {
        match index.classify(point) {
            Some(cell_id) => counts[cell_id] += 1,
            None => outside += 1,
        }
    }

    log::debug!(
        "Counted {} of {} points into {} cells",
        points.len() as u64 - outside,
        points.len(),
        counts.len()
    );

    PointCounts { counts, outside }
}
