//! R-tree over grid cell envelopes.
//!
//! Queries return candidates whose envelopes intersect the query envelope.
//! Envelopes over-approximate hexagons, so callers that need containment go
//! through [`CellIndex::classify`], which runs the exact test.

use geo::{BoundingRect as _, Intersects as _, MultiPolygon, Point, Rect};
use rstar::{AABB, RTree, RTreeObject};

use crate::{CellId, Grid};

/// A cell's id and bounding box as stored in the R-tree.
struct CellEnvelope {
    cell_id: CellId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CellEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over a [`Grid`], built once per aggregation run.
///
/// Borrows the grid, so the grid cannot change while the index exists.
/// Read-only after construction and safe to share between threads.
pub struct CellIndex<'a> {
    grid: &'a Grid,
    tree: RTree<CellEnvelope>,
}

impl<'a> CellIndex<'a> {
    /// Bulk-loads every cell of `grid` into an R-tree, each exactly once.
    #[must_use]
    pub fn new(grid: &'a Grid) -> Self {
        let entries: Vec<CellEnvelope> = grid
            .cells()
            .iter()
            .map(|cell| CellEnvelope {
                cell_id: cell.cell_id,
                envelope: compute_envelope(&cell.geometry),
            })
            .collect();

        let tree = RTree::bulk_load(entries);
        log::debug!("Indexed {} grid cells", tree.size());

        Self { grid, tree }
    }

    #[must_use]
    pub const fn grid(&self) -> &'a Grid {
        self.grid
    }

    /// Number of indexed cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Cells whose envelopes intersect `rect`, in index order.
    ///
    /// A superset of the cells that actually intersect `rect`.
    #[must_use]
    pub fn candidates(&self, rect: Rect<f64>) -> Vec<CellId> {
        let query = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.cell_id)
            .collect()
    }

    /// Cells whose envelopes contain `point`, in index order.
    #[must_use]
    pub fn candidates_at(&self, point: Point<f64>) -> Vec<CellId> {
        let query = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.cell_id)
            .collect()
    }

    /// Resolves the cell containing `point`, or `None` if it lies outside
    /// every cell.
    ///
    /// Candidates are tested in index order and the first whose geometry
    /// intersects the point wins. Points on an edge or vertex shared by
    /// adjacent cells therefore land in exactly one of them; which one
    /// depends on the R-tree layout.
    #[must_use]
    pub fn classify(&self, point: Point<f64>) -> Option<CellId> {
        let query = AABB::from_point([point.x(), point.y()]);

        for entry in self.tree.locate_in_envelope_intersecting(&query) {
            let cell = &self.grid.cells()[entry.cell_id];
            if cell.geometry.intersects(&point) {
                return Some(entry.cell_id);
            }
        }
        None
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use geo::{Contains as _, Intersects as _, coord};

    use super::*;
    use crate::{Boundary, Crs, GridCell, HexLayout, build_grid};

    fn square_grid(size: f64, diameter: f64) -> Grid {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: size, y: size });
        let boundary = Boundary::from_polygon(rect.to_polygon(), Some(Crs::epsg(32616)));
        build_grid(&boundary, diameter).unwrap()
    }

    #[test]
    fn indexes_every_cell_once() {
        let grid = square_grid(2000.0, 300.0);
        let index = CellIndex::new(&grid);
        assert_eq!(index.len(), grid.len());

        let mut all = index.candidates(Rect::new(
            coord! { x: -1.0, y: -1.0 },
            coord! { x: 2001.0, y: 2001.0 },
        ));
        all.sort_unstable();
        let expected: Vec<CellId> = (0..grid.len()).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn candidates_are_a_superset_of_containing_cell() {
        let grid = square_grid(1000.0, 500.0);
        let index = CellIndex::new(&grid);

        let p = Point::new(412.3, 377.9);
        let containing: Vec<CellId> = grid
            .cells()
            .iter()
            .filter(|c| c.geometry.contains(&p))
            .map(|c| c.cell_id)
            .collect();
        assert_eq!(containing.len(), 1);

        let candidates = index.candidates_at(p);
        assert!(candidates.contains(&containing[0]));
        assert!(candidates.len() < grid.len());
    }

    #[test]
    fn classify_matches_brute_force_scan() {
        let grid = square_grid(1500.0, 400.0);
        let index = CellIndex::new(&grid);

        for i in 0..30 {
            for j in 0..30 {
                let p = Point::new(
                    f64::from(i).mul_add(50.0, 3.1),
                    f64::from(j).mul_add(50.0, 11.9),
                );
                let scanned = grid
                    .cells()
                    .iter()
                    .find(|c| c.geometry.contains(&p))
                    .map(|c| c.cell_id);
                assert_eq!(index.classify(p), scanned, "point {p:?}");
            }
        }
    }

    #[test]
    fn points_outside_the_grid_classify_to_none() {
        let grid = square_grid(1000.0, 500.0);
        let index = CellIndex::new(&grid);

        assert_eq!(index.classify(Point::new(-10.0, 500.0)), None);
        assert_eq!(index.classify(Point::new(5000.0, 5000.0)), None);
        assert!(index.candidates_at(Point::new(5000.0, 5000.0)).is_empty());
    }

    #[test]
    fn shared_vertex_classifies_into_exactly_one_cell() {
        let grid = square_grid(3000.0, 500.0);
        let index = CellIndex::new(&grid);

        // Right vertex of the interior hexagon centred at (750, 866), shared
        // with the odd-row hexagons centred at (1125, 649.5) and
        // (1125, 1082.5).
        let layout = HexLayout::from_diameter(500.0).unwrap();
        let bounds = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 3000.0, y: 3000.0 });
        let vertex: Point<f64> = layout.lattice_point(layout.origin(bounds), 14, 6).into();
        assert!((vertex.x() - 1000.0).abs() < 1e-9);

        let touching = grid
            .cells()
            .iter()
            .filter(|c| c.geometry.intersects(&vertex))
            .count();
        assert_eq!(touching, 3);

        let first = index.classify(vertex);
        assert!(first.is_some());
        assert_eq!(index.classify(vertex), first);
    }

    #[test]
    fn shared_edge_point_classifies_into_exactly_one_cell() {
        let left = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 });
        let right = Rect::new(coord! { x: 10.0, y: 0.0 }, coord! { x: 20.0, y: 10.0 });
        let grid = Grid::from_cells(
            vec![
                GridCell::new(0, MultiPolygon(vec![left.to_polygon()])),
                GridCell::new(1, MultiPolygon(vec![right.to_polygon()])),
            ],
            Crs::epsg(32616),
        )
        .unwrap();
        let index = CellIndex::new(&grid);

        let on_edge = Point::new(10.0, 5.0);
        assert_eq!(index.candidates_at(on_edge).len(), 2);
        assert!(index.classify(on_edge).is_some());
        assert_eq!(index.classify(Point::new(5.0, 5.0)), Some(0));
        assert_eq!(index.classify(Point::new(15.0, 5.0)), Some(1));
    }

    #[test]
    fn empty_grid_classifies_nothing() {
        let grid = Grid::from_cells(Vec::new(), Crs::epsg(32616)).unwrap();
        let index = CellIndex::new(&grid);
        assert!(index.is_empty());
        assert_eq!(index.classify(Point::new(0.0, 0.0)), None);
    }
}
