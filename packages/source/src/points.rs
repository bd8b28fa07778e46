//! Loaders for small auxiliary point datasets (streetlights, bus stops).
//!
//! These fit in memory and are read whole. Coordinates must already be in
//! the grid's CRS.

use std::fs::File;
use std::path::Path;

use geo::{Geometry, Point};
use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::SourceError;
use crate::parsing::{normalize_header, parse_coordinate};

/// On-disk encoding of a point dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PointFormat {
    /// Delimited text with x/y columns.
    Csv,
    /// A `GeoJSON` document of `Point`/`MultiPoint` features.
    Geojson,
}

impl PointFormat {
    /// Infers the format from a file extension (`.csv`, `.geojson`, `.json`).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "geojson" | "json" => Some(Self::Geojson),
            _ => None,
        }
    }
}

/// Columns holding the projected coordinates of a CSV point dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointColumns {
    pub x: String,
    pub y: String,
}

impl Default for PointColumns {
    fn default() -> Self {
        Self {
            x: "x_coordinate".to_owned(),
            y: "y_coordinate".to_owned(),
        }
    }
}

/// Points read from an auxiliary dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedPoints {
    pub points: Vec<Point<f64>>,
    /// Records skipped for missing or non-point geometry.
    pub dropped: u64,
}

/// Reads every point of a dataset.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or parsed, or a
/// configured CSV column is missing.
pub fn load_points(
    path: &Path,
    format: PointFormat,
    columns: &PointColumns,
) -> Result<LoadedPoints, SourceError> {
    let loaded = match format {
        PointFormat::Csv => read_csv_points(File::open(path)?, columns)?,
        PointFormat::Geojson => parse_geojson_points(&std::fs::read_to_string(path)?)?,
    };

    log::info!(
        "Loaded {} points from {} ({} dropped)",
        loaded.points.len(),
        path.display(),
        loaded.dropped
    );

    Ok(loaded)
}

/// Reads points from CSV with a header row.
///
/// # Errors
///
/// Returns [`SourceError`] if the CSV is malformed or a column is missing.
pub fn read_csv_points<R: std::io::Read>(
    reader: R,
    columns: &PointColumns,
) -> Result<LoadedPoints, SourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

    let position = |name: &str| -> Result<usize, SourceError> {
        let wanted = normalize_header(name);
        headers
            .iter()
            .position(|h| *h == wanted)
            .ok_or_else(|| SourceError::MissingColumn {
                name: wanted,
                available: headers.join(", "),
            })
    };
    let x_idx = position(&columns.x)?;
    let y_idx = position(&columns.y)?;

    let mut loaded = LoadedPoints::default();
    for result in reader.records() {
        let record = result?;
        let x = record.get(x_idx).and_then(parse_coordinate);
        let y = record.get(y_idx).and_then(parse_coordinate);

        match (x, y) {
            (Some(x), Some(y)) => loaded.points.push(Point::new(x, y)),
            _ => loaded.dropped += 1,
        }
    }

    Ok(loaded)
}

/// Extracts points from a `GeoJSON` document.
///
/// `Point` and `MultiPoint` geometries contribute every point; features
/// with no geometry or another geometry type are counted as dropped.
///
/// # Errors
///
/// Returns [`SourceError`] if the text is not valid `GeoJSON`.
pub fn parse_geojson_points(text: &str) -> Result<LoadedPoints, SourceError> {
    let geojson: GeoJson = text.parse()?;

    let geometries: Vec<Option<geojson::Geometry>> = match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .map(|feature| feature.geometry)
            .collect(),
        GeoJson::Feature(feature) => vec![feature.geometry],
        GeoJson::Geometry(geometry) => vec![Some(geometry)],
    };

    let mut loaded = LoadedPoints::default();
    for geometry in geometries {
        let Some(geometry) = geometry else {
            loaded.dropped += 1;
            continue;
        };

        match Geometry::<f64>::try_from(geometry)? {
            Geometry::Point(point) => loaded.points.push(point),
            Geometry::MultiPoint(points) => loaded.points.extend(points.0),
            _ => loaded.dropped += 1,
        }
    }

    Ok(loaded)
}
