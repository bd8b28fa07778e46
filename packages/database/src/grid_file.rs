//! The grid as a `GeoJSON` `FeatureCollection`.
//!
//! One feature per cell with an integer `cell_id` property, plus the legacy
//! top-level `crs` member naming the projected CRS. Coordinates are written
//! with round-trip precision, so a reloaded grid is identical to the one
//! that was saved.

use std::path::Path;

use crime_grid_source::boundary::{crs_from_members, crs_member};
use crime_grid_spatial::{Crs, Grid, GridCell};
use geo::{Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};

use crate::DbError;
use crate::paths::{ensure_dir, staging_path};

/// Serializes `grid` to `GeoJSON` text.
///
/// # Errors
///
/// Returns [`DbError::Json`] if serialization fails.
pub fn grid_to_geojson(grid: &Grid) -> Result<String, DbError> {
    let features = grid
        .cells()
        .iter()
        .map(|cell| {
            let mut properties = JsonObject::new();
            properties.insert("cell_id".to_owned(), JsonValue::from(cell.cell_id));

            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&cell.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(crs_member(grid.crs())),
    };
    Ok(serde_json::to_string(&collection)?)
}

/// Writes `grid` to `path`, replacing any existing file only once the new
/// one is fully written.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be written or renamed.
pub fn write_grid(path: &Path, grid: &Grid) -> Result<(), DbError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let staging = staging_path(path);
    std::fs::write(&staging, grid_to_geojson(grid)?)?;
    std::fs::rename(&staging, path)?;

    log::info!(
        "Saved grid with {} cells ({}) to {}",
        grid.len(),
        grid.crs(),
        path.display()
    );
    Ok(())
}

/// Parses a grid from `GeoJSON` text.
///
/// `crs_override` is used when the document has no `crs` member and takes
/// precedence when it does.
///
/// # Errors
///
/// Returns [`DbError`] if the text is not a `FeatureCollection`, a feature
/// lacks a `cell_id` or polygon geometry, no CRS is known, or the cells do
/// not form a valid grid.
pub fn grid_from_geojson(text: &str, crs_override: Option<&Crs>) -> Result<Grid, DbError> {
    let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
        return Err(DbError::conversion("grid file is not a FeatureCollection"));
    };

    let crs = match crs_override {
        Some(crs) => crs.clone(),
        None => crs_from_members(collection.foreign_members.as_ref())?
            .ok_or_else(|| DbError::conversion("grid file has no crs member"))?,
    };

    let mut cells = Vec::with_capacity(collection.features.len());
    for (position, feature) in collection.features.into_iter().enumerate() {
        let cell_id = feature
            .property("cell_id")
            .and_then(JsonValue::as_u64)
            .and_then(|id| usize::try_from(id).ok())
            .ok_or_else(|| {
                DbError::conversion(format!("feature {position} has no integer cell_id"))
            })?;

        let geometry = feature.geometry.ok_or_else(|| {
            DbError::conversion(format!("cell {cell_id} has no geometry"))
        })?;
        let geometry = match Geometry::<f64>::try_from(geometry)? {
            Geometry::Polygon(polygon) => MultiPolygon(vec![polygon]),
            Geometry::MultiPolygon(multi) => multi,
            _ => {
                return Err(DbError::conversion(format!(
                    "cell {cell_id} geometry is not a polygon"
                )));
            }
        };

        cells.push(GridCell::new(cell_id, geometry));
    }

    Ok(Grid::from_cells(cells, crs)?)
}

/// Reads a grid previously saved with [`write_grid`].
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be read or parsed.
pub fn read_grid(path: &Path, crs_override: Option<&Crs>) -> Result<Grid, DbError> {
    let text = std::fs::read_to_string(path)?;
    let grid = grid_from_geojson(&text, crs_override)?;

    log::info!(
        "Loaded grid with {} cells ({}) from {}",
        grid.len(),
        grid.crs(),
        path.display()
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use crime_grid_spatial::{Boundary, build_grid};
    use geo::{Rect, coord};

    use super::*;

    fn sample_grid() -> Grid {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1000.0, y: 1000.0 });
        let boundary = Boundary::from_polygon(rect.to_polygon(), Some(Crs::epsg(32616)));
        build_grid(&boundary, 500.0).unwrap()
    }

    #[test]
    fn grid_survives_a_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("processed/hex_grid.geojson");
        let grid = sample_grid();

        write_grid(&path, &grid).unwrap();
        assert!(!staging_path(&path).exists());

        let loaded = read_grid(&path, None).unwrap();
        assert_eq!(loaded.crs(), &Crs::epsg(32616));
        assert_eq!(loaded.cells(), grid.cells());
    }

    #[test]
    fn features_carry_cell_ids_and_crs() {
        let text = grid_to_geojson(&sample_grid()).unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::32616");
        assert_eq!(value["features"].as_array().unwrap().len(), 12);
        assert_eq!(value["features"][3]["properties"]["cell_id"], 3);
    }

    #[test]
    fn plain_polygons_and_override_crs_are_accepted() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"cell_id": 1},
                 "geometry": {"type": "Polygon", "coordinates": [[[1, 0], [2, 0], [2, 1], [1, 1], [1, 0]]]}},
                {"type": "Feature", "properties": {"cell_id": 0},
                 "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]}}
            ]
        }"#;

        assert!(grid_from_geojson(text, None).is_err());

        let grid = grid_from_geojson(text, Some(&Crs::epsg(3435))).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.cells()[0].cell_id, 0);
    }

    #[test]
    fn rejects_features_without_cell_id() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}
            ]
        }"#;
        assert!(matches!(
            grid_from_geojson(text, Some(&Crs::epsg(3435))),
            Err(DbError::Conversion { .. })
        ));
    }
}
