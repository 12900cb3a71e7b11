//! Test mesh creation helpers
//!
//! All meshes use unit quads split into two clockwise cells:
//! `(i, j) (i, j+1) (i+1, j)` and `(i, j+1) (i+1, j+1) (i+1, j)`.

use crate::{CellRef, NavMeshConfig, TriNavMesh};
use glam::Vec3;
use trinav_common::{Result, TriMesh};

pub fn test_mesh_config() -> NavMeshConfig {
    NavMeshConfig::new()
        .with_spatial_depth(6)
        .with_plane_tolerance(0.5)
        .with_offset_scale(0.1)
}

/// One unit quad: two cells sharing one wall.
pub fn create_two_cell_mesh() -> Result<TriNavMesh> {
    create_grid_mesh(1, 1)
}

/// A flat `cols` x `rows` grid of unit quads at y = 0.
pub fn create_grid_mesh(cols: usize, rows: usize) -> Result<TriNavMesh> {
    let grid = TriMesh::grid(cols, rows, 1.0, (0.0, 0.0), 0.0);
    TriNavMesh::from_tri_mesh(&grid, &test_mesh_config())
}

/// A one quad wide strip along x.
pub fn create_corridor_mesh(length: usize) -> Result<TriNavMesh> {
    create_grid_mesh(length, 1)
}

/// Two disconnected 2x2 grids: x in [0, 2] and x in [4, 6].
pub fn create_island_mesh() -> Result<TriNavMesh> {
    let mut grid = TriMesh::grid(2, 2, 1.0, (0.0, 0.0), 0.0);
    grid.append(&TriMesh::grid(2, 2, 1.0, (4.0, 0.0), 0.0));
    TriNavMesh::from_tri_mesh(&grid, &test_mesh_config())
}

/// Two unit quads stacked at y = 0 and y = 3, sharing the same footprint.
pub fn create_layered_mesh() -> Result<TriNavMesh> {
    let mut grid = TriMesh::grid(1, 1, 1.0, (0.0, 0.0), 0.0);
    grid.append(&TriMesh::grid(1, 1, 1.0, (0.0, 0.0), 3.0));
    TriNavMesh::from_tri_mesh(&grid, &test_mesh_config())
}

/// Centroid of cell `index`.
pub fn centroid(mesh: &TriNavMesh, index: u32) -> Vec3 {
    mesh.cell(CellRef::new(index)).centroid()
}

/// Cell index of the first cell of grid quad `(i, j)` in a grid with `rows` rows.
pub fn quad_cell(i: usize, j: usize, rows: usize) -> u32 {
    ((i * rows + j) * 2) as u32
}
