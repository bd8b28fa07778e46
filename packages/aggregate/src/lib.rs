#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Per-cell aggregation of crime events and auxiliary point datasets.
//!
//! [`ChunkedAggregator`] pulls bounded batches from a
//! [`CrimeBatchSource`](crime_grid_source::CrimeBatchSource), resolves each
//! event to a cell through a shared
//! [`CellIndex`](crime_grid_spatial::CellIndex), and keeps three
//! accumulators: a total per cell, a count per tracked category per cell,
//! and a sparse [`MonthlyTally`] keyed by cell, month, hour, weekday and
//! primary type. [`count_points`] does the same one-shot for small
//! in-memory point sets. [`EnrichedGrid`] joins the results into the wide
//! one-row-per-cell table.

pub mod chunked;
pub mod enriched;
pub mod environment;
pub mod tally;

pub use chunked::{AggregationOutput, AggregationStats, ChunkedAggregator, aggregate};
pub use enriched::EnrichedGrid;
pub use environment::{PointCounts, count_points};
pub use tally::{CellAggregates, MONTHLY_COLUMNS, MonthlyRow, MonthlyTally};

/// Errors that can occur while combining accumulators.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Two accumulators that describe different grids or category lists.
    #[error("Shape mismatch: {message}")]
    ShapeMismatch {
        /// Description of what differs.
        message: String,
    },

    /// Two output columns would share a name.
    #[error("Duplicate column {name:?}")]
    DuplicateColumn {
        /// The clashing column name.
        name: String,
    },
}
