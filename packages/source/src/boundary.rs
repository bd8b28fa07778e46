//! Boundary polygons read from `GeoJSON`.
//!
//! The legacy `crs` member (`{"type": "name", "properties": {"name":
//! "urn:ogc:def:crs:EPSG::3435"}}`) is honored when present; a configured
//! CRS overrides it.

use std::path::Path;

use crime_grid_spatial::{Boundary, Crs};
use geo::{Geometry, MultiPolygon, Polygon};
use geojson::{GeoJson, JsonObject, JsonValue};

use crate::SourceError;

/// Reads a boundary file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read, is not `GeoJSON`,
/// or contains no polygon.
pub fn load_boundary(path: &Path, crs_override: Option<&Crs>) -> Result<Boundary, SourceError> {
    let text = std::fs::read_to_string(path)?;
    let boundary = parse_boundary(&text, crs_override)?;

    log::info!(
        "Loaded boundary {} with {} part(s), CRS {}",
        path.display(),
        boundary.polygons().0.len(),
        boundary
            .crs()
            .map_or_else(|| "unknown".to_owned(), ToString::to_string)
    );

    Ok(boundary)
}

/// Parses a boundary from `GeoJSON` text.
///
/// Every `Polygon` and `MultiPolygon` in the document becomes a part of the
/// boundary; other geometry types are ignored.
///
/// # Errors
///
/// Returns [`SourceError`] if the text is not `GeoJSON`, the `crs` member
/// names an unrecognized system, or there are no polygons.
pub fn parse_boundary(text: &str, crs_override: Option<&Crs>) -> Result<Boundary, SourceError> {
    let geojson: GeoJson = text.parse()?;

    let (geometries, foreign_members): (Vec<geojson::Geometry>, Option<JsonObject>) =
        match geojson {
            GeoJson::FeatureCollection(collection) => (
                collection
                    .features
                    .into_iter()
                    .filter_map(|feature| feature.geometry)
                    .collect(),
                collection.foreign_members,
            ),
            GeoJson::Feature(feature) => (
                feature.geometry.into_iter().collect(),
                feature.foreign_members,
            ),
            GeoJson::Geometry(geometry) => {
                let members = geometry.foreign_members.clone();
                (vec![geometry], members)
            }
        };

    let mut polygons = Vec::new();
    for geometry in geometries {
        collect_polygons(Geometry::<f64>::try_from(geometry)?, &mut polygons);
    }

    if polygons.is_empty() {
        return Err(SourceError::Normalization {
            message: "boundary GeoJSON contains no polygons".to_owned(),
        });
    }

    let crs = match crs_override {
        Some(crs) => Some(crs.clone()),
        None => crs_from_members(foreign_members.as_ref())?,
    };

    Ok(Boundary::new(MultiPolygon(polygons), crs))
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multi) => out.extend(multi.0),
        Geometry::GeometryCollection(collection) => {
            for inner in collection.0 {
                collect_polygons(inner, out);
            }
        }
        _ => {}
    }
}

/// Reads the legacy named `crs` member of a `GeoJSON` object.
///
/// # Errors
///
/// Returns [`SourceError::Spatial`] if the member names an unrecognized
/// system.
pub fn crs_from_members(members: Option<&JsonObject>) -> Result<Option<Crs>, SourceError> {
    let name = members
        .and_then(|m| m.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(JsonValue::as_str);

    Ok(match name {
        Some(name) => Some(Crs::parse(name)?),
        None => None,
    })
}

/// Builds the legacy named `crs` member for `crs`.
#[must_use]
pub fn crs_member(crs: &Crs) -> JsonObject {
    let mut members = JsonObject::new();
    members.insert(
        "crs".to_owned(),
        serde_json::json!({
            "type": "name",
            "properties": { "name": crs.urn() },
        }),
    );
    members
}

#[cfg(test)]
mod tests {
    use geo::Area as _;

    use super::*;

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3435" } },
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "city" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "island" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[200.0, 0.0], [210.0, 0.0], [210.0, 10.0], [200.0, 10.0], [200.0, 0.0]]]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Point", "coordinates": [5.0, 5.0] }
            }
        ]
    }"#;

    #[test]
    fn reads_polygons_and_crs_member() {
        let boundary = parse_boundary(SQUARE, None).unwrap();

        assert_eq!(boundary.polygons().0.len(), 2);
        assert!((boundary.polygons().unsigned_area() - 10_100.0).abs() < 1e-9);
        assert_eq!(boundary.crs(), Some(&Crs::epsg(3435)));
    }

    #[test]
    fn override_wins_over_crs_member() {
        let boundary = parse_boundary(SQUARE, Some(&Crs::epsg(32616))).unwrap();
        assert_eq!(boundary.crs(), Some(&Crs::epsg(32616)));
    }

    #[test]
    fn missing_crs_member_leaves_crs_unset() {
        let text = r#"{"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}"#;
        let boundary = parse_boundary(text, None).unwrap();
        assert!(boundary.crs().is_none());
    }

    #[test]
    fn no_polygons_is_an_error() {
        let text = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(matches!(
            parse_boundary(text, None),
            Err(SourceError::Normalization { .. })
        ));
    }

    #[test]
    fn crs_member_round_trips() {
        let members = crs_member(&Crs::epsg(3435));
        assert_eq!(
            crs_from_members(Some(&members)).unwrap(),
            Some(Crs::epsg(3435))
        );
        assert_eq!(crs_from_members(None).unwrap(), None);
    }
}
