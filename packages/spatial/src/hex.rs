//! Hexagonal tessellation clipped to a boundary.
//!
//! Hexagons have vertices at 0°, 60°, ..., 300° around their centre, so
//! each one is `2r` wide and `r·√3` tall. Centres in the same row are `3r`
//! apart; the rows in between are shifted right by `1.5r` and sit halfway
//! between their neighbours, giving a gap-free tiling where rows of the
//! same parity are `r·√3` apart.

use geo::{
    Area as _, BooleanOps as _, BoundingRect as _, Coord, LineString, MultiPolygon, Polygon, Rect,
    Relate as _, Validation as _, coord,
};

use crate::{Boundary, Grid, GridCell, SpatialError};

/// Clipped pieces with at most this fraction of a full hexagon's area are
/// slivers from the overlay and are discarded.
const DEGENERATE_AREA_FRACTION: f64 = 1e-9;

/// Spacing of a hexagon tiling for one cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexLayout {
    radius: f64,
}

impl HexLayout {
    /// Creates a layout from the vertex-to-vertex diameter.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Configuration`] unless `diameter` is finite
    /// and positive.
    pub fn from_diameter(diameter: f64) -> Result<Self, SpatialError> {
        if !diameter.is_finite() || diameter <= 0.0 {
            return Err(SpatialError::configuration(format!(
                "hex diameter must be a positive number, got {diameter}"
            )));
        }

        Ok(Self {
            radius: diameter / 2.0,
        })
    }

    /// Centre-to-vertex distance.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Distance between centres in the same row.
    #[must_use]
    pub fn column_pitch(&self) -> f64 {
        3.0 * self.radius
    }

    /// Distance between rows of the same parity.
    #[must_use]
    pub fn row_pitch(&self) -> f64 {
        3.0_f64.sqrt() * self.radius
    }

    /// Horizontal shift of odd rows.
    #[must_use]
    pub fn odd_row_offset(&self) -> f64 {
        1.5 * self.radius
    }

    /// Area of one unclipped hexagon.
    #[must_use]
    pub fn hexagon_area(&self) -> f64 {
        1.5 * 3.0_f64.sqrt() * self.radius * self.radius
    }

    /// The closed hexagon centred at `center`.
    #[must_use]
    pub fn hexagon(&self, center: Coord<f64>) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = (0..=6_u8)
            .map(|i| {
                let angle = f64::from(i % 6) * std::f64::consts::FRAC_PI_3;
                coord! {
                    x: self.radius.mul_add(angle.cos(), center.x),
                    y: self.radius.mul_add(angle.sin(), center.y),
                }
            })
            .collect();

        Polygon::new(LineString::from(ring), vec![])
    }

    /// Lower-left anchor of a tiling covering `bounds`: one column pitch
    /// left of and one row pitch below the box.
    #[must_use]
    pub fn origin(&self, bounds: Rect<f64>) -> Coord<f64> {
        coord! {
            x: bounds.min().x - self.column_pitch(),
            y: bounds.min().y - self.row_pitch(),
        }
    }

    /// The lattice point `origin + (i·r/2, j·r·√3/2)`.
    ///
    /// Every tiling vertex and centre is a lattice point, so neighbouring
    /// hexagons share bit-identical vertices.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn lattice_point(&self, origin: Coord<f64>, i: i64, j: i64) -> Coord<f64> {
        coord! {
            x: (i as f64).mul_add(self.radius / 2.0, origin.x),
            y: (j as f64).mul_add(self.row_pitch() / 2.0, origin.y),
        }
    }

    /// The hexagon centred on lattice point `(i, j)`.
    fn lattice_hexagon(&self, origin: Coord<f64>, i: i64, j: i64) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = [(2, 0), (1, 1), (-1, 1), (-2, 0), (-1, -1), (1, -1), (2, 0)]
            .iter()
            .map(|&(di, dj)| self.lattice_point(origin, i + di, j + dj))
            .collect();

        Polygon::new(LineString::from(ring), vec![])
    }

    /// Hexagons tiling `bounds`, with one extra row pitch and column pitch
    /// on every side.
    ///
    /// Ordered row by row from the bottom, left to right within a row.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tiling(&self, bounds: Rect<f64>) -> Vec<Polygon<f64>> {
        let origin = self.origin(bounds);
        let x_end = bounds.max().x + self.column_pitch();
        let y_end = bounds.max().y + self.row_pitch();

        // Rows are half a row pitch (one lattice step) apart; centres in a
        // row are six lattice steps apart, odd rows shifted by three.
        let rows = ((y_end - origin.y) / (self.row_pitch() / 2.0)).floor() as i64 + 1;

        let mut hexagons = Vec::new();
        for j in 0..rows {
            let mut i = if j % 2 == 0 { 0 } else { 3 };
            while self.lattice_point(origin, i, j).x <= x_end {
                hexagons.push(self.lattice_hexagon(origin, i, j));
                i += 6;
            }
        }

        hexagons
    }
}

/// Tiles `boundary` with hexagons of the given vertex-to-vertex diameter
/// and clips them to it.
///
/// Hexagons that do not overlap the boundary, and clipped pieces that are
/// invalid or have (near) zero area, are dropped. Surviving cells get
/// dense ids in generation order.
///
/// # Errors
///
/// Returns [`SpatialError::Configuration`] before doing any work if the
/// boundary has no projected CRS, is empty, or the diameter is not a
/// positive number.
pub fn build_grid(boundary: &Boundary, hex_diameter: f64) -> Result<Grid, SpatialError> {
    let crs = boundary.projected_crs()?.clone();
    let layout = HexLayout::from_diameter(hex_diameter)?;

    if boundary.is_empty() {
        return Err(SpatialError::configuration("boundary has no polygons"));
    }

    // The lattice is anchored on the input extent, not the dissolved one,
    // which the overlay may have snapped.
    let Some(extent) = boundary.bounding_rect() else {
        return Err(SpatialError::configuration("boundary has no extent"));
    };
    let region = boundary.dissolve();

    let min_area = layout.hexagon_area() * DEGENERATE_AREA_FRACTION;
    let hexagons = layout.tiling(extent);
    log::debug!(
        "Generated {} candidate hexagons (radius {})",
        hexagons.len(),
        layout.radius()
    );

    let mut cells = Vec::new();
    let mut degenerate = 0_usize;

    for hexagon in hexagons {
        let Some(envelope) = hexagon.bounding_rect() else {
            continue;
        };
        if !rects_overlap(&envelope, &extent) {
            continue;
        }

        // Uncut hexagons skip the overlay, which snaps coordinates, so
        // interior neighbours keep bit-identical shared edges.
        if region.relate(&hexagon).is_covers() {
            cells.push(GridCell::new(cells.len(), MultiPolygon(vec![hexagon])));
            continue;
        }

        let clipped: MultiPolygon<f64> = hexagon.intersection(&region);
        if clipped.0.is_empty() {
            continue;
        }

        if !clipped.is_valid() || clipped.unsigned_area() <= min_area {
            degenerate += 1;
            continue;
        }

        cells.push(GridCell::new(cells.len(), clipped));
    }

    if degenerate > 0 {
        log::debug!("Dropped {degenerate} degenerate clipped cells");
    }
    log::info!(
        "Built hex grid: {} cells, diameter {hex_diameter}, CRS {crs}",
        cells.len()
    );

    Ok(Grid::from_dense(cells, crs))
}

fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x < b.max().x && b.min().x < a.max().x && a.min().y < b.max().y && b.min().y < a.max().y
}

#[cfg(test)]
mod tests {
    use geo::{Area as _, Contains as _, Point, Validation as _};

    use super::*;
    use crate::Crs;

    fn square_boundary(size: f64) -> Boundary {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: size, y: size });
        Boundary::from_polygon(rect.to_polygon(), Some(Crs::epsg(32616)))
    }

    #[test]
    fn hexagon_has_six_vertices_at_radius() {
        let layout = HexLayout::from_diameter(500.0).unwrap();
        let hex = layout.hexagon(coord! { x: 100.0, y: 50.0 });

        let ring = hex.exterior();
        assert_eq!(ring.0.len(), 7);
        assert_eq!(ring.0.first(), ring.0.last());
        for c in &ring.0 {
            let dist = (c.x - 100.0).hypot(c.y - 50.0);
            assert!((dist - 250.0).abs() < 1e-9);
        }
        assert!((hex.unsigned_area() - layout.hexagon_area()).abs() < 1e-3);
    }

    #[test]
    fn tiling_hexagons_match_angle_construction() {
        let layout = HexLayout::from_diameter(500.0).unwrap();
        let bounds = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1000.0, y: 1000.0 });

        for tile in layout.tiling(bounds) {
            let ring = &tile.exterior().0;
            let cx = (ring[0].x + ring[3].x) / 2.0;
            let cy = (ring[0].y + ring[3].y) / 2.0;
            let reference = layout.hexagon(coord! { x: cx, y: cy });

            for (a, b) in ring.iter().zip(&reference.exterior().0) {
                assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn layout_spacing_follows_radius() {
        let layout = HexLayout::from_diameter(500.0).unwrap();
        assert!((layout.radius() - 250.0).abs() < f64::EPSILON);
        assert!((layout.column_pitch() - 750.0).abs() < f64::EPSILON);
        assert!((layout.odd_row_offset() - 375.0).abs() < f64::EPSILON);
        assert!((layout.row_pitch() - 250.0 * 3.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_diameter() {
        assert!(HexLayout::from_diameter(0.0).is_err());
        assert!(HexLayout::from_diameter(-5.0).is_err());
        assert!(HexLayout::from_diameter(f64::NAN).is_err());
        assert!(build_grid(&square_boundary(1000.0), 0.0).is_err());
    }

    #[test]
    fn rejects_boundary_without_projected_crs() {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let no_crs = Boundary::from_polygon(rect.to_polygon(), None);
        assert!(matches!(
            build_grid(&no_crs, 500.0),
            Err(SpatialError::Configuration { .. })
        ));

        let geographic = Boundary::from_polygon(rect.to_polygon(), Some(Crs::epsg(4326)));
        assert!(matches!(
            build_grid(&geographic, 0.1),
            Err(SpatialError::Configuration { .. })
        ));
    }

    #[test]
    fn square_1000_with_diameter_500_has_twelve_cells() {
        // Even rows at y = 0, 433, 866 hold centres x = 0, 750; odd rows at
        // y = 216.5, 649.5, 1082.5 hold x = 375, 1125.
        let grid = build_grid(&square_boundary(1000.0), 500.0).unwrap();
        assert_eq!(grid.len(), 12);
    }

    #[test]
    fn cell_ids_are_dense() {
        let grid = build_grid(&square_boundary(3000.0), 400.0).unwrap();
        for (i, cell) in grid.cells().iter().enumerate() {
            assert_eq!(cell.cell_id, i);
        }
    }

    #[test]
    fn cells_cover_the_boundary_area() {
        for (size, diameter) in [(1000.0, 500.0), (2500.0, 300.0), (730.0, 1000.0)] {
            let grid = build_grid(&square_boundary(size), diameter).unwrap();
            let expected = size * size;
            let rel = (grid.total_area() - expected).abs() / expected;
            assert!(rel < 1e-6, "size {size} diameter {diameter}: rel err {rel}");
        }
    }

    #[test]
    fn cells_have_positive_area_and_are_valid() {
        let grid = build_grid(&square_boundary(1800.0), 500.0).unwrap();
        for cell in grid.cells() {
            assert!(cell.geometry.unsigned_area() > 0.0);
            assert!(cell.geometry.is_valid());
        }
    }

    #[test]
    fn interior_points_fall_in_exactly_one_cell() {
        let grid = build_grid(&square_boundary(1000.0), 500.0).unwrap();

        // Offsets chosen to avoid landing exactly on hexagon edges.
        for i in 0..20 {
            for j in 0..20 {
                let p = Point::new(
                    f64::from(i).mul_add(50.0, 13.7),
                    f64::from(j).mul_add(50.0, 7.3),
                );
                let hits = grid
                    .cells()
                    .iter()
                    .filter(|c| c.geometry.contains(&p))
                    .count();
                assert_eq!(hits, 1, "point {p:?} in {hits} cells");
            }
        }
    }

    #[test]
    fn multi_part_boundary_is_unioned_before_clipping() {
        let a = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1000.0, y: 1000.0 });
        let b = Rect::new(coord! { x: 500.0, y: 0.0 }, coord! { x: 1500.0, y: 1000.0 });
        let boundary = Boundary::new(
            MultiPolygon(vec![a.to_polygon(), b.to_polygon()]),
            Some(Crs::epsg(32616)),
        );

        let grid = build_grid(&boundary, 500.0).unwrap();
        let rel = (grid.total_area() - 1_500_000.0).abs() / 1_500_000.0;
        assert!(rel < 1e-6, "overlapping parts must not be counted twice");
    }

    #[test]
    fn disjoint_parts_keep_gap_uncovered() {
        let a = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1000.0, y: 1000.0 });
        let b = Rect::new(coord! { x: 5000.0, y: 0.0 }, coord! { x: 6000.0, y: 1000.0 });
        let boundary = Boundary::new(
            MultiPolygon(vec![a.to_polygon(), b.to_polygon()]),
            Some(Crs::epsg(32616)),
        );

        let grid = build_grid(&boundary, 500.0).unwrap();
        let rel = (grid.total_area() - 2_000_000.0).abs() / 2_000_000.0;
        assert!(rel < 1e-6);

        let gap = Point::new(3000.0, 500.0);
        assert!(grid.cells().iter().all(|c| !c.geometry.contains(&gap)));
    }
}
