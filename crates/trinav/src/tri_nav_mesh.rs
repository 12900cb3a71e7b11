//! Navigation mesh of linked triangle cells
//!
//! [`TriNavMesh::build`] turns a triangle soup into a cell arena, indexes the
//! cells in a [`TriCellQuadTree`] and links neighbors that share a wall. The
//! result is immutable and can be shared between threads behind an `Arc`.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use trinav_common::{Error, Rect2, Result, TriMesh, TOLERANCE_STD};

use crate::config::NavMeshConfig;
use crate::quad_tree::TriCellQuadTree;
use crate::tri_cell::{CellRef, PathRelationship, TriCell};

/// A built navigation mesh.
#[derive(Debug)]
pub struct TriNavMesh {
    vertices: Arc<[f32]>,
    cells: Vec<TriCell>,
    spatial: Option<TriCellQuadTree>,
    plane_tolerance: f32,
    offset_scale: f32,
}

impl TriNavMesh {
    /// Builds a mesh from flat vertex (`[x, y, z]` per vertex) and index buffers.
    ///
    /// Triangles must be wound clockwise when viewed from above. An empty
    /// index buffer produces an empty mesh on which every lookup fails.
    pub fn build(vertices: &[f32], indices: &[i32], config: &NavMeshConfig) -> Result<Self> {
        config.validate()?;

        if vertices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "vertex buffer length {} is not a multiple of 3",
                vertices.len()
            )));
        }
        if indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "index buffer length {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(bad) = vertices.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidMesh(format!(
                "vertex component {bad} is not finite"
            )));
        }
        if let Some(bad) = indices.iter().find(|i| **i < 0) {
            return Err(Error::InvalidMesh(format!("negative vertex index {bad}")));
        }

        let vertices: Arc<[f32]> = Arc::from(vertices);
        let mut cells = Vec::with_capacity(indices.len() / 3);
        for (i, tri) in indices.chunks_exact(3).enumerate() {
            let id = CellRef::new(i as u32);
            cells.push(TriCell::new(
                id,
                vertices.clone(),
                tri[0] as usize,
                tri[1] as usize,
                tri[2] as usize,
            )?);
        }

        let mut mesh = Self {
            vertices,
            cells,
            spatial: None,
            plane_tolerance: config.effective_plane_tolerance(),
            offset_scale: config.effective_offset_scale(),
        };
        if mesh.cells.is_empty() {
            log::warn!("Built empty navigation mesh");
            return Ok(mesh);
        }

        let bounds = Rect2::from_points(
            mesh.cells
                .iter()
                .flat_map(|c| [c.bounds().min, c.bounds().max]),
        )
        .ok_or_else(|| Error::InvalidMesh("mesh has no bounds".to_string()))?;
        let mut spatial = TriCellQuadTree::new(bounds, config.spatial_depth)?;
        for cell in &mesh.cells {
            if !spatial.add(cell) {
                log::warn!("{} was not added to the spatial index", cell.id());
            }
        }

        let link_count = link_cells(&mut mesh.cells, &spatial);
        mesh.spatial = Some(spatial);

        log::info!(
            "Built navigation mesh: {} cells, {} links, bounds {:?}..{:?}",
            mesh.cells.len(),
            link_count,
            bounds.min,
            bounds.max
        );
        Ok(mesh)
    }

    /// Builds a mesh from a [`TriMesh`].
    pub fn from_tri_mesh(mesh: &TriMesh, config: &NavMeshConfig) -> Result<Self> {
        Self::build(&mesh.vertices, &mesh.indices, config)
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn cells(&self) -> &[TriCell] {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, id: CellRef) -> &TriCell {
        &self.cells[id.index()]
    }

    pub fn get_cell(&self, id: CellRef) -> Option<&TriCell> {
        self.cells.get(id.index())
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of linked walls, counting each shared wall once.
    pub fn link_count(&self) -> usize {
        self.cells.iter().map(TriCell::link_count).sum::<usize>() / 2
    }

    /// XZ bounds of the mesh, `None` when empty.
    pub fn bounds(&self) -> Option<&Rect2> {
        self.spatial.as_ref().map(TriCellQuadTree::bounds)
    }

    pub fn spatial_index(&self) -> Option<&TriCellQuadTree> {
        self.spatial.as_ref()
    }

    pub fn plane_tolerance(&self) -> f32 {
        self.plane_tolerance
    }

    pub fn offset_scale(&self) -> f32 {
        self.offset_scale
    }

    /// Cells whose column contains (x, z).
    pub fn cells_for_point(&self, x: f32, z: f32) -> Vec<CellRef> {
        let mut results = Vec::new();
        if let Some(spatial) = &self.spatial {
            spatial.cells_for_point(&self.cells, x, z, &mut results);
        }
        results
    }

    /// Cells whose footprint overlaps `rect`.
    pub fn cells_in_column(&self, rect: &Rect2) -> Vec<CellRef> {
        let mut results = Vec::new();
        if let Some(spatial) = &self.spatial {
            spatial.cells_in_column(&self.cells, rect, &mut results);
        }
        results
    }

    /// Closest cell to `point` and the matching position on it.
    ///
    /// See [`TriCellQuadTree::closest_cell`].
    pub fn closest_cell(&self, point: Vec3, must_be_in_column: bool) -> Option<(CellRef, Vec3)> {
        self.spatial
            .as_ref()
            .and_then(|s| s.closest_cell(&self.cells, point, must_be_in_column))
    }

    /// True if a cell's column holds `point` with its plane within `y_tolerance`.
    pub fn is_valid_position(&self, point: Vec3, y_tolerance: f32) -> bool {
        self.cells_for_point(point.x, point.z).into_iter().any(|id| {
            (self.cell(id).plane_y(point.x, point.z) - point.y).abs() <= y_tolerance
        })
    }

    /// Walks the straight XZ line from `start` in `start_cell` toward `end` in
    /// `end_cell`. Fails as soon as the line leaves the mesh.
    pub fn has_line_of_sight(
        &self,
        start: Vec3,
        end: Vec3,
        start_cell: CellRef,
        end_cell: CellRef,
    ) -> bool {
        let (Some(first), Some(last)) = (self.get_cell(start_cell), self.get_cell(end_cell)) else {
            return false;
        };
        let from = first.safe_point(Vec2::new(start.x, start.z), self.offset_scale);
        let to = last.safe_point(Vec2::new(end.x, end.z), self.offset_scale);

        let mut current = start_cell;
        // A straight line visits each cell at most once.
        for _ in 0..=self.cells.len() {
            if current == end_cell {
                return true;
            }
            match self.cell(current).path_relationship(from, to) {
                PathRelationship::ExitingCell {
                    neighbor: Some(next),
                    ..
                } => current = next,
                PathRelationship::EndingCell => return true,
                PathRelationship::ExitingCell { neighbor: None, .. }
                | PathRelationship::NoRelationship => return false,
            }
        }
        false
    }
}

fn link_cells(cells: &mut [TriCell], spatial: &TriCellQuadTree) -> usize {
    let mut links = 0;
    let mut candidates = Vec::new();
    for i in 0..cells.len() {
        if cells[i].link_count() == 3 {
            continue;
        }
        let id = CellRef::new(i as u32);
        candidates.clear();
        let search = cells[i].bounds().expanded(TOLERANCE_STD);
        spatial.cells_in_column(cells, &search, &mut candidates);
        for &other in &candidates {
            if other == id {
                continue;
            }
            if TriCell::link_cells(cells, id, other, true).is_some() {
                links += 1;
                if cells[i].link_count() == 3 {
                    break;
                }
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::*;

    #[test]
    fn test_build_rejects_malformed_buffers() {
        let config = NavMeshConfig::default();
        assert!(TriNavMesh::build(&[0.0, 1.0], &[], &config).is_err());
        assert!(TriNavMesh::build(&[0.0; 9], &[0, 1], &config).is_err());
        assert!(TriNavMesh::build(&[0.0; 9], &[0, 1, -2], &config).is_err());
        assert!(TriNavMesh::build(&[0.0; 9], &[0, 1, 3], &config).is_err());
        assert!(TriNavMesh::build(&[f32::NAN, 0.0, 0.0], &[], &config).is_err());

        let mut flipped = TriMesh::grid(1, 1, 1.0, (0.0, 0.0), 0.0);
        flipped.flip_winding();
        assert!(TriNavMesh::from_tri_mesh(&flipped, &config).is_err());
    }

    #[test]
    fn test_empty_mesh() -> Result<()> {
        let mesh = TriNavMesh::build(&[], &[], &NavMeshConfig::default())?;
        assert!(mesh.is_empty());
        assert!(mesh.bounds().is_none());
        assert!(mesh.closest_cell(Vec3::ZERO, false).is_none());
        assert!(!mesh.is_valid_position(Vec3::ZERO, 1.0));
        Ok(())
    }

    #[test]
    fn test_two_cell_linking() -> Result<()> {
        let mesh = create_two_cell_mesh()?;
        assert_eq!(mesh.cell_count(), 2);
        assert_eq!(mesh.link_count(), 1);
        let a = mesh.cell(CellRef::new(0));
        let b = mesh.cell(CellRef::new(1));
        assert_eq!(a.link_count(), 1);
        assert_eq!(b.link_index(CellRef::new(0)), Some(2));
        Ok(())
    }

    #[test]
    fn test_grid_linking_is_reciprocal() -> Result<()> {
        let mesh = create_grid_mesh(5, 4)?;
        assert_eq!(mesh.cell_count(), 40);
        // Per quad one diagonal, plus shared quad edges
        assert_eq!(mesh.link_count(), 20 + 4 * 4 + 5 * 3);
        for cell in mesh.cells() {
            for wall in 0..3 {
                if let Some(n) = cell.link(wall) {
                    let neighbor_wall = cell.link_wall(wall).map(usize::from);
                    assert_eq!(neighbor_wall.and_then(|w| mesh.cell(n).link(w)), Some(cell.id()));
                    assert_eq!(
                        neighbor_wall.and_then(|w| mesh.cell(n).link_wall(w)),
                        Some(wall as u8)
                    );
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_parameters_are_clamped() -> Result<()> {
        let grid = TriMesh::grid(1, 1, 1.0, (0.0, 0.0), 0.0);
        let config = NavMeshConfig::new()
            .with_plane_tolerance(0.0)
            .with_offset_scale(-1.0);
        let mesh = TriNavMesh::from_tri_mesh(&grid, &config)?;
        assert_eq!(mesh.plane_tolerance(), f32::EPSILON);
        assert_eq!(mesh.offset_scale(), 0.0);
        Ok(())
    }

    #[test]
    fn test_valid_position_and_closest_cell() -> Result<()> {
        let mesh = create_grid_mesh(3, 3)?;
        assert!(mesh.is_valid_position(Vec3::new(1.2, 0.3, 1.7), 0.5));
        assert!(!mesh.is_valid_position(Vec3::new(1.2, 2.0, 1.7), 0.5));
        assert!(!mesh.is_valid_position(Vec3::new(-2.0, 0.0, 1.0), 0.5));

        let (id, p) = mesh.closest_cell(Vec3::new(1.2, 0.3, 1.7), true).ok_or_else(|| {
            Error::Pathfinding("no cell".to_string())
        })?;
        assert!(mesh.cell(id).is_in_column(1.2, 1.7));
        assert_eq!(p.y, 0.0);
        assert!(mesh.closest_cell(Vec3::new(-2.0, 0.0, 1.0), true).is_none());
        assert!(mesh.closest_cell(Vec3::new(-2.0, 0.0, 1.0), false).is_some());
        Ok(())
    }

    #[test]
    fn test_overlapping_layers() -> Result<()> {
        let mesh = create_layered_mesh()?;
        assert_eq!(mesh.cells_for_point(0.5, 0.4).len(), 2);
        let (low, _) = mesh
            .closest_cell(Vec3::new(0.5, 0.2, 0.4), true)
            .ok_or_else(|| Error::Pathfinding("no cell".to_string()))?;
        let (high, _) = mesh
            .closest_cell(Vec3::new(0.5, 2.8, 0.4), true)
            .ok_or_else(|| Error::Pathfinding("no cell".to_string()))?;
        assert_ne!(low, high);
        assert_eq!(mesh.cell(high).plane_y(0.5, 0.4), 3.0);
        Ok(())
    }

    #[test]
    fn test_line_of_sight() -> Result<()> {
        let mesh = create_grid_mesh(4, 1)?;
        let start = Vec3::new(0.2, 0.0, 0.5);
        let end = Vec3::new(3.8, 0.0, 0.5);
        let (sc, _) = mesh.closest_cell(start, true).ok_or_else(|| Error::Pathfinding("start".into()))?;
        let (ec, _) = mesh.closest_cell(end, true).ok_or_else(|| Error::Pathfinding("end".into()))?;
        assert!(mesh.has_line_of_sight(start, end, sc, ec));
        assert!(mesh.has_line_of_sight(start, start, sc, sc));

        let islands = create_island_mesh()?;
        let start = Vec3::new(0.5, 0.0, 0.5);
        let end = Vec3::new(5.5, 0.0, 0.5);
        let (sc, _) = islands.closest_cell(start, true).ok_or_else(|| Error::Pathfinding("start".into()))?;
        let (ec, _) = islands.closest_cell(end, true).ok_or_else(|| Error::Pathfinding("end".into()))?;
        assert!(!islands.has_line_of_sight(start, end, sc, ec));
        Ok(())
    }
}
