#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Hexagonal grid construction and point-in-cell lookups.
//!
//! [`hex::build_grid`] tiles a projected [`Boundary`] with regular hexagons
//! and clips them to the boundary. [`CellIndex`] wraps the finished
//! [`Grid`] in an R-tree over cell envelopes so a point is resolved to its
//! cell by an envelope query followed by an exact test against the few
//! candidates, never by scanning every cell.

pub mod boundary;
pub mod crs;
pub mod grid;
pub mod hex;
pub mod index;

pub use boundary::Boundary;
pub use crs::Crs;
pub use grid::{CellId, Grid, GridCell};
pub use hex::{HexLayout, build_grid};
pub use index::CellIndex;

/// Errors that can occur while building or loading a grid.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// Input that cannot be tessellated (missing CRS, bad diameter, ...).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what went wrong.
        message: String,
    },

    /// A set of cells that violates the grid invariants.
    #[error("Invalid grid: {message}")]
    InvalidGrid {
        /// Description of what went wrong.
        message: String,
    },
}

impl SpatialError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_grid(message: impl Into<String>) -> Self {
        Self::InvalidGrid {
            message: message.into(),
        }
    }
}
