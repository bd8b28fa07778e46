//! The wide one-row-per-cell feature table.
//!
//! Columns, in order: `cell_id`, `crime_count_total`, one `crime_<category>`
//! per tracked category, one `<dataset>_count` per auxiliary dataset, then
//! `geometry`.

use crime_grid_crime_models::column_slug;
use crime_grid_spatial::{CellId, Grid};

use crate::{AggregateError, CellAggregates, PointCounts};

pub const CELL_ID_COLUMN: &str = "cell_id";
pub const TOTAL_COLUMN: &str = "crime_count_total";
pub const GEOMETRY_COLUMN: &str = "geometry";

/// `<dataset>_count`, e.g. `streetlight_count`.
#[must_use]
pub fn environment_column(dataset: &str) -> String {
    format!("{}_count", column_slug(dataset))
}

/// Grid cells joined with their crime and auxiliary counts.
pub struct EnrichedGrid<'a> {
    grid: &'a Grid,
    aggregates: &'a CellAggregates,
    environment: Vec<(String, &'a PointCounts)>,
}

impl<'a> EnrichedGrid<'a> {
    /// # Errors
    ///
    /// Returns [`AggregateError::ShapeMismatch`] if `aggregates` was built
    /// for a different number of cells, or
    /// [`AggregateError::DuplicateColumn`] if two tracked categories map to
    /// the same column or one maps onto a fixed column.
    pub fn new(grid: &'a Grid, aggregates: &'a CellAggregates) -> Result<Self, AggregateError> {
        if aggregates.cell_count() != grid.len() {
            return Err(AggregateError::ShapeMismatch {
                message: format!(
                    "aggregates cover {} cells, grid has {}",
                    aggregates.cell_count(),
                    grid.len()
                ),
            });
        }

        let mut columns = vec![
            CELL_ID_COLUMN.to_owned(),
            TOTAL_COLUMN.to_owned(),
            GEOMETRY_COLUMN.to_owned(),
        ];
        for column in aggregates.category_columns() {
            if columns.contains(&column) {
                return Err(AggregateError::DuplicateColumn { name: column });
            }
            columns.push(column);
        }

        Ok(Self {
            grid,
            aggregates,
            environment: Vec::new(),
        })
    }

    /// Appends a `<dataset>_count` column.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] if the counts cover a different number of
    /// cells or the column name is already taken.
    pub fn with_environment(
        mut self,
        dataset: &str,
        counts: &'a PointCounts,
    ) -> Result<Self, AggregateError> {
        if counts.counts().len() != self.grid.len() {
            return Err(AggregateError::ShapeMismatch {
                message: format!(
                    "{dataset} counts cover {} cells, grid has {}",
                    counts.counts().len(),
                    self.grid.len()
                ),
            });
        }

        let column = environment_column(dataset);
        if column == CELL_ID_COLUMN
            || column == GEOMETRY_COLUMN
            || self.count_columns().contains(&column)
        {
            return Err(AggregateError::DuplicateColumn { name: column });
        }

        self.environment.push((column, counts));
        Ok(self)
    }

    #[must_use]
    pub const fn grid(&self) -> &'a Grid {
        self.grid
    }

    /// Names of the integer count columns, in table order.
    #[must_use]
    pub fn count_columns(&self) -> Vec<String> {
        std::iter::once(TOTAL_COLUMN.to_owned())
            .chain(self.aggregates.category_columns())
            .chain(self.environment.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    /// Every column name, in table order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(CELL_ID_COLUMN.to_owned())
            .chain(self.count_columns())
            .chain(std::iter::once(GEOMETRY_COLUMN.to_owned()))
            .collect()
    }

    /// Values of the count columns for one cell, aligned with
    /// [`Self::count_columns`].
    #[must_use]
    pub fn row_counts(&self, cell_id: CellId) -> Vec<u64> {
        std::iter::once(self.aggregates.total(cell_id))
            .chain(self.aggregates.category_counts(cell_id).iter().copied())
            .chain(self.environment.iter().map(|(_, counts)| counts.get(cell_id)))
            .collect()
    }
}
