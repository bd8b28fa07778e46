//! The immutable set of grid cells.

use geo::{Area as _, MultiPolygon};

use crate::{Crs, SpatialError};

/// Dense cell identifier, `0..grid.len()`.
pub type CellId = usize;

/// One polygon of the tessellation.
///
/// Cells clipped by a concave or multi-part boundary may consist of more
/// than one part, so the geometry is a [`MultiPolygon`].
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub cell_id: CellId,
    pub geometry: MultiPolygon<f64>,
}

impl GridCell {
    #[must_use]
    pub const fn new(cell_id: CellId, geometry: MultiPolygon<f64>) -> Self {
        Self { cell_id, geometry }
    }
}

/// A finished grid: cells stored at the index equal to their `cell_id`.
///
/// There is no way to mutate a grid after construction; a
/// [`CellIndex`](crate::CellIndex) borrows it for the duration of an
/// aggregation run.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<GridCell>,
    crs: Crs,
}

impl Grid {
    /// Builds a grid from cells whose ids already equal their position.
    pub(crate) const fn from_dense(cells: Vec<GridCell>, crs: Crs) -> Self {
        Self { cells, crs }
    }

    /// Builds a grid from cells in any order, e.g. read back from a file.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGrid`] if the ids are not exactly
    /// `0..cells.len()` or any cell has no area.
    pub fn from_cells(mut cells: Vec<GridCell>, crs: Crs) -> Result<Self, SpatialError> {
        cells.sort_by_key(|cell| cell.cell_id);

        for (expected, cell) in cells.iter().enumerate() {
            if cell.cell_id != expected {
                return Err(SpatialError::invalid_grid(format!(
                    "cell ids must be dense and unique: expected {expected}, found {}",
                    cell.cell_id
                )));
            }
            if cell.geometry.unsigned_area() <= 0.0 {
                return Err(SpatialError::invalid_grid(format!(
                    "cell {} has no area",
                    cell.cell_id
                )));
            }
        }

        Ok(Self { cells, crs })
    }

    #[must_use]
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, cell_id: CellId) -> Option<&GridCell> {
        self.cells.get(cell_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Sum of all cell areas, in squared CRS units.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.cells
            .iter()
            .map(|cell| cell.geometry.unsigned_area())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};

    use super::*;

    fn unit_cell(cell_id: CellId, offset: f64) -> GridCell {
        let rect = Rect::new(
            coord! { x: offset, y: 0.0 },
            coord! { x: offset + 1.0, y: 1.0 },
        );
        GridCell::new(cell_id, MultiPolygon(vec![rect.to_polygon()]))
    }

    #[test]
    fn from_cells_orders_by_id() {
        let grid = Grid::from_cells(
            vec![unit_cell(1, 1.0), unit_cell(0, 0.0), unit_cell(2, 2.0)],
            Crs::epsg(32616),
        )
        .unwrap();

        let ids: Vec<_> = grid.cells().iter().map(|c| c.cell_id).collect();
        assert_eq!(ids, [0, 1, 2]);
        assert!((grid.total_area() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn from_cells_rejects_gaps_and_duplicates() {
        let gap = Grid::from_cells(vec![unit_cell(0, 0.0), unit_cell(2, 1.0)], Crs::epsg(3435));
        assert!(matches!(gap, Err(SpatialError::InvalidGrid { .. })));

        let dup = Grid::from_cells(vec![unit_cell(0, 0.0), unit_cell(0, 1.0)], Crs::epsg(3435));
        assert!(dup.is_err());
    }
}
