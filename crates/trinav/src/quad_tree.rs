//! Quadtree over the XZ projection of cells
//!
//! Each cell is stored in the deepest node whose bounds fully contain the
//! cell's bounds, so any cell whose column holds a point sits on the chain of
//! nodes from the root down to the deepest node containing that point.

use glam::{Vec2, Vec3};
use trinav_common::{Error, Rect2, Result};

use crate::tri_cell::{CellRef, TriCell};

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: Rect2,
    depth: u32,
    cells: Vec<CellRef>,
    children: Option<Box<[QuadNode; 4]>>,
}

impl QuadNode {
    fn new(bounds: Rect2, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            cells: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, id: CellRef, cell_bounds: &Rect2, max_depth: u32) -> bool {
        if self.depth < max_depth {
            let quadrants = self.bounds.quadrants();
            if let Some(q) = quadrants.iter().position(|b| b.contains_rect(cell_bounds)) {
                let depth = self.depth + 1;
                let children = self
                    .children
                    .get_or_insert_with(|| Box::new(quadrants.map(|b| QuadNode::new(b, depth))));
                return children[q].insert(id, cell_bounds, max_depth);
            }
        }
        if self.cells.contains(&id) {
            return false;
        }
        self.cells.push(id);
        true
    }

    fn cells_for_point(&self, cells: &[TriCell], p: Vec2, results: &mut Vec<CellRef>) {
        if !self.bounds.contains_point(p) {
            return;
        }
        results.extend(
            self.cells
                .iter()
                .copied()
                .filter(|id| cells[id.index()].is_in_column(p.x, p.y)),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.cells_for_point(cells, p, results);
            }
        }
    }

    fn cells_in_column(&self, cells: &[TriCell], rect: &Rect2, results: &mut Vec<CellRef>) {
        if !self.bounds.intersects(rect) {
            return;
        }
        results.extend(
            self.cells
                .iter()
                .copied()
                .filter(|id| cells[id.index()].intersects(rect)),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.cells_in_column(cells, rect, results);
            }
        }
    }

    // Cells stored on the chain of nodes containing `p`.
    fn cells_on_chain(&self, p: Vec2, results: &mut Vec<CellRef>) {
        if !self.bounds.contains_point(p) {
            return;
        }
        results.extend_from_slice(&self.cells);
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.cells_on_chain(p, results);
            }
        }
    }

    fn collect(&self, results: &mut Vec<CellRef>) {
        results.extend_from_slice(&self.cells);
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect(results);
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map_or(0, |c| c.iter().map(QuadNode::node_count).sum())
    }
}

/// Bounded-depth quadtree of cells.
///
/// The tree stores [`CellRef`]s only; queries take the cell arena they were
/// built from.
#[derive(Debug, Clone)]
pub struct TriCellQuadTree {
    root: QuadNode,
    max_depth: u32,
    len: usize,
}

impl TriCellQuadTree {
    /// Creates an empty tree over `bounds`. Depth is at least 1.
    pub fn new(bounds: Rect2, max_depth: u32) -> Result<Self> {
        if bounds.min.x >= bounds.max.x || bounds.min.y >= bounds.max.y {
            return Err(Error::InvalidMesh(format!(
                "spatial index bounds are empty: {:?} .. {:?}",
                bounds.min, bounds.max
            )));
        }
        Ok(Self {
            root: QuadNode::new(bounds, 1),
            max_depth: max_depth.max(1),
            len: 0,
        })
    }

    pub fn bounds(&self) -> &Rect2 {
        &self.root.bounds
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Adds a cell. Returns false if it lies outside the tree or is already present.
    pub fn add(&mut self, cell: &TriCell) -> bool {
        if !self.root.bounds.contains_rect(cell.bounds()) {
            return false;
        }
        let added = self.root.insert(cell.id(), cell.bounds(), self.max_depth);
        if added {
            self.len += 1;
        }
        added
    }

    /// Cells whose column contains (x, z). Overlapping layers yield several cells.
    pub fn cells_for_point(&self, cells: &[TriCell], x: f32, z: f32, results: &mut Vec<CellRef>) {
        self.root.cells_for_point(cells, Vec2::new(x, z), results);
    }

    /// Cells whose footprint overlaps `rect`.
    pub fn cells_in_column(&self, cells: &[TriCell], rect: &Rect2, results: &mut Vec<CellRef>) {
        self.root.cells_in_column(cells, rect, results);
    }

    /// Every cell in the tree.
    pub fn all_cells(&self, results: &mut Vec<CellRef>) {
        self.root.collect(results);
    }

    /// Closest cell to `point` and the matching position on it.
    ///
    /// With `must_be_in_column` only cells whose column holds the point are
    /// considered and the one with the nearest plane wins. Otherwise the
    /// [`TriCell::closest_cell`] approximation runs over the cells stored along
    /// the nodes touching the point, falling back to all cells when that
    /// neighborhood is empty.
    pub fn closest_cell(
        &self,
        cells: &[TriCell],
        point: Vec3,
        must_be_in_column: bool,
    ) -> Option<(CellRef, Vec3)> {
        if must_be_in_column {
            let mut candidates = Vec::new();
            self.cells_for_point(cells, point.x, point.z, &mut candidates);
            return candidates
                .into_iter()
                .map(|id| {
                    let y = cells[id.index()].plane_y(point.x, point.z);
                    (id, y, (y - point.y).abs())
                })
                .min_by(|a, b| a.2.total_cmp(&b.2))
                .map(|(id, y, _)| (id, Vec3::new(point.x, y, point.z)));
        }

        let bounds = &self.root.bounds;
        let clamped = Vec2::new(point.x, point.z).clamp(bounds.min, bounds.max);
        let mut candidates = Vec::new();
        self.root.cells_on_chain(clamped, &mut candidates);
        if candidates.is_empty() {
            self.all_cells(&mut candidates);
        }
        TriCell::closest_cell(point, candidates.iter().map(|id| &cells[id.index()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trinav_common::TriMesh;

    fn grid_cells(cols: usize, rows: usize) -> Vec<TriCell> {
        let mesh = TriMesh::grid(cols, rows, 1.0, (0.0, 0.0), 0.0);
        let verts: Arc<[f32]> = Arc::from(mesh.vertices.clone());
        mesh.indices
            .chunks_exact(3)
            .enumerate()
            .map(|(i, t)| {
                TriCell::new(CellRef::new(i as u32), verts.clone(), t[0] as usize, t[1] as usize, t[2] as usize)
                    .unwrap()
            })
            .collect()
    }

    fn build(cells: &[TriCell], depth: u32) -> TriCellQuadTree {
        let bounds = Rect2::from_points(cells.iter().flat_map(|c| [c.bounds().min, c.bounds().max])).unwrap();
        let mut tree = TriCellQuadTree::new(bounds, depth).unwrap();
        for cell in cells {
            assert!(tree.add(cell));
        }
        tree
    }

    #[test]
    fn test_empty_bounds_rejected() {
        let r = Rect2::new(Vec2::new(1.0, 0.0), Vec2::new(1.0, 5.0));
        assert!(TriCellQuadTree::new(r, 4).is_err());
        let ok = TriCellQuadTree::new(Rect2::new(Vec2::ZERO, Vec2::ONE), 0).unwrap();
        assert_eq!(ok.max_depth(), 1);
    }

    #[test]
    fn test_add_rejects_duplicates_and_outside() {
        let cells = grid_cells(4, 4);
        let mut tree = build(&cells, 4);
        assert_eq!(tree.len(), 32);
        assert!(!tree.add(&cells[5]));
        assert_eq!(tree.len(), 32);
        assert!(tree.node_count() > 1);

        let far = grid_cells(1, 1);
        let mut small = TriCellQuadTree::new(Rect2::new(Vec2::ZERO, Vec2::splat(0.5)), 3).unwrap();
        assert!(!small.add(&far[0]));
        assert!(small.is_empty());
    }

    #[test]
    fn test_cells_for_point_matches_brute_force() {
        let cells = grid_cells(4, 3);
        let tree = build(&cells, 5);
        for &(x, z) in &[(0.2, 0.3), (3.7, 2.9), (1.5, 1.5), (2.0, 1.0), (-1.0, 1.0)] {
            let mut found = Vec::new();
            tree.cells_for_point(&cells, x, z, &mut found);
            found.sort();
            let mut expected: Vec<CellRef> = cells
                .iter()
                .filter(|c| c.is_in_column(x, z))
                .map(|c| c.id())
                .collect();
            expected.sort();
            assert_eq!(found, expected, "point ({x}, {z})");
        }
    }

    #[test]
    fn test_cells_in_column_and_all() {
        let cells = grid_cells(4, 4);
        let tree = build(&cells, 3);
        let mut found = Vec::new();
        tree.cells_in_column(&cells, &Rect2::new(Vec2::new(0.1, 0.1), Vec2::new(0.2, 0.2)), &mut found);
        assert_eq!(found, vec![CellRef::new(0)]);

        let mut all = Vec::new();
        tree.all_cells(&mut all);
        assert_eq!(all.len(), cells.len());
    }

    #[test]
    fn test_closest_cell() {
        let cells = grid_cells(2, 2);
        let tree = build(&cells, 3);

        let (id, p) = tree.closest_cell(&cells, Vec3::new(0.2, 1.0, 0.3), true).unwrap();
        assert!(cells[id.index()].is_in_column(0.2, 0.3));
        assert_eq!(p, Vec3::new(0.2, 0.0, 0.3));

        assert!(tree.closest_cell(&cells, Vec3::new(5.0, 0.0, 5.0), true).is_none());
        let (id, p) = tree.closest_cell(&cells, Vec3::new(5.0, 0.0, 1.5), false).unwrap();
        assert!(cells[id.index()].bounds().max.x >= 2.0);
        assert!((p.x - 2.0).abs() < 1e-4);
    }
}
