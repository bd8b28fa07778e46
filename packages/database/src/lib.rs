#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Persistence for the crime grid pipeline.
//!
//! The grid is stored as a `GeoJSON` `FeatureCollection` so it can be
//! rebuilt once and reloaded by later steps. Aggregation results go into a
//! single `DuckDB` file holding the `features` and `monthly_cell_crime`
//! tables, written to a temporary path and renamed into place only once
//! both tables are complete.

pub mod grid_file;
pub mod paths;
pub mod tables;

use crime_grid_source::SourceError;
use crime_grid_spatial::SpatialError;

/// Errors that can occur while reading or writing pipeline artifacts.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` structure or geometry conversion failed.
    #[error("GeoJSON error: {0}")]
    Geojson(#[from] geojson::Error),

    /// The grid file's `crs` member could not be read.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The stored cells do not form a valid grid.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl DbError {
    pub(crate) fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}
