//! The area a grid is built over.

use geo::{BoundingRect as _, MultiPolygon, Polygon, Rect, unary_union};

use crate::{Crs, SpatialError};

/// One or more polygons in a projected CRS.
///
/// Parts may overlap or touch; [`Boundary::dissolve`] merges them before
/// clipping.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    polygons: MultiPolygon<f64>,
    crs: Option<Crs>,
}

impl Boundary {
    #[must_use]
    pub const fn new(polygons: MultiPolygon<f64>, crs: Option<Crs>) -> Self {
        Self { polygons, crs }
    }

    #[must_use]
    pub fn from_polygon(polygon: Polygon<f64>, crs: Option<Crs>) -> Self {
        Self::new(MultiPolygon(vec![polygon]), crs)
    }

    /// Replaces the boundary's CRS (used when the source file carries none
    /// and the configuration names one).
    #[must_use]
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    #[must_use]
    pub const fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    #[must_use]
    pub const fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty()
    }

    /// Axis-aligned bounding box of every part.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.polygons.bounding_rect()
    }

    /// Returns the boundary's CRS, failing unless it is present and
    /// projected.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Configuration`] if the CRS is missing or
    /// geographic.
    pub fn projected_crs(&self) -> Result<&Crs, SpatialError> {
        let crs = self.crs.as_ref().ok_or_else(|| {
            SpatialError::configuration("boundary has no CRS; a projected CRS is required")
        })?;

        if crs.is_geographic() {
            return Err(SpatialError::configuration(format!(
                "boundary CRS {crs} is geographic; a projected CRS with linear units is required"
            )));
        }

        Ok(crs)
    }

    /// The geometric union of all parts.
    #[must_use]
    pub fn dissolve(&self) -> MultiPolygon<f64> {
        unary_union(self.polygons.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use geo::{Area as _, Rect, coord};

    use super::*;

    fn square(min: f64, max: f64) -> Polygon<f64> {
        Rect::new(coord! { x: min, y: min }, coord! { x: max, y: max }).to_polygon()
    }

    #[test]
    fn missing_crs_is_a_configuration_error() {
        let boundary = Boundary::from_polygon(square(0.0, 10.0), None);
        assert!(matches!(
            boundary.projected_crs(),
            Err(SpatialError::Configuration { .. })
        ));
    }

    #[test]
    fn geographic_crs_is_a_configuration_error() {
        let boundary = Boundary::from_polygon(square(0.0, 1.0), Some(Crs::epsg(4326)));
        assert!(boundary.projected_crs().is_err());

        let boundary = boundary.with_crs(Crs::epsg(32616));
        assert_eq!(boundary.projected_crs().unwrap(), &Crs::epsg(32616));
    }

    #[test]
    fn dissolve_merges_overlapping_parts() {
        let boundary = Boundary::new(
            MultiPolygon(vec![square(0.0, 10.0), square(5.0, 15.0)]),
            Some(Crs::epsg(32616)),
        );
        let merged = boundary.dissolve();
        // 100 + 100 - 25 overlap
        assert!((merged.unsigned_area() - 175.0).abs() < 1e-6);
    }
}
