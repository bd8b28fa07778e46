#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Input side of the grid pipeline.
//!
//! Crime records arrive through the [`CrimeBatchSource`] trait: a finite,
//! pull-based stream of bounded batches. [`crimes::CsvCrimeSource`] reads a
//! delimited export lazily, [`memory::VecBatchSource`] serves events already
//! in memory. Small auxiliary point datasets and boundary polygons are read
//! whole by [`points`] and [`boundary`].

pub mod boundary;
pub mod crimes;
pub mod memory;
pub mod parsing;
pub mod points;
pub mod progress;

use crime_grid_crime_models::CrimeEvent;
use crime_grid_spatial::SpatialError;

pub use crimes::{CrimeColumns, CsvCrimeSource};
pub use memory::VecBatchSource;
pub use points::{LoadedPoints, PointColumns, PointFormat};

/// Errors that can occur while reading input data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` structure or geometry conversion failed.
    #[error("GeoJSON error: {0}")]
    Geojson(#[from] geojson::Error),

    /// A configured column is absent from the header row.
    #[error("Missing column {name:?} (available: {available})")]
    MissingColumn {
        /// Configured column name, after header normalization.
        name: String,
        /// Comma-separated normalized header.
        available: String,
    },

    /// Invalid CRS or boundary geometry.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// Data normalization error.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// A finite, single-pass stream of crime event batches.
///
/// Each call yields at most one batch; `Ok(None)` marks the end of the
/// stream and every later call keeps returning `Ok(None)`. Batches are
/// bounded by the producer, so a consumer never holds more than one batch
/// at a time.
pub trait CrimeBatchSource {
    /// Produces the next batch of events.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the underlying input cannot be read.
    fn next_batch(&mut self) -> Result<Option<Vec<CrimeEvent>>, SourceError>;
}

impl<S: CrimeBatchSource + ?Sized> CrimeBatchSource for &mut S {
    fn next_batch(&mut self) -> Result<Option<Vec<CrimeEvent>>, SourceError> {
        (**self).next_batch()
    }
}

impl<S: CrimeBatchSource + ?Sized> CrimeBatchSource for Box<S> {
    fn next_batch(&mut self) -> Result<Option<Vec<CrimeEvent>>, SourceError> {
        (**self).next_batch()
    }
}
