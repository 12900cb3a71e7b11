//! Triangle cells of the navigation graph
//!
//! A [`TriCell`] is a clockwise triangle that references its vertices in a
//! shared buffer and knows up to three neighbors, one per wall. Wall `i` runs
//! from vertex `i` to vertex `(i + 1) % 3`. Cells live in an arena owned by the
//! mesh and refer to each other through [`CellRef`].
//!
//! Links are written once while the mesh is built and are read-only afterward,
//! so a built mesh can be shared freely between threads.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use trinav_common::{
    line_relationship, sloppy_eq_xz, tri_area_2d, xz, Error, LineRelationship,
    PointLineRelation, Rect2, Result, TOLERANCE_STD,
};

/// Index of a cell in its mesh arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRef(u32);

impl CellRef {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// How a 2D segment relates to a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathRelationship {
    /// The segment leaves the cell through `wall` at `exit_point`.
    /// `neighbor` is `None` when the wall is a mesh boundary.
    ExitingCell {
        wall: u8,
        neighbor: Option<CellRef>,
        exit_point: Vec2,
    },
    /// The segment ends inside the cell's column.
    EndingCell,
    /// The segment neither ends in nor leaves the cell.
    NoRelationship,
}

/// A triangle node of the navigation graph.
#[derive(Debug, Clone)]
pub struct TriCell {
    id: CellRef,
    verts: Arc<[f32]>,
    indices: [usize; 3],
    normal: Vec3,
    plane_d: f32,
    centroid: Vec3,
    bounds: Rect2,
    wall_normals: [Vec2; 3],
    wall_midpoints: [Vec3; 3],
    // Distances between wall midpoints: (0,1), (1,2), (0,2)
    midpoint_distances: [f32; 3],
    links: [Option<CellRef>; 3],
    link_walls: [Option<u8>; 3],
}

impl TriCell {
    /// Creates a cell from three vertex indices into `verts`.
    ///
    /// Fails if an index is out of range or the triangle is degenerate or not
    /// clockwise on the XZ plane.
    pub fn new(id: CellRef, verts: Arc<[f32]>, a: usize, b: usize, c: usize) -> Result<Self> {
        let vert_count = verts.len() / 3;
        for index in [a, b, c] {
            if index >= vert_count {
                return Err(Error::InvalidMesh(format!(
                    "{id}: vertex index {index} out of range ({vert_count} vertices)"
                )));
            }
        }

        let indices = [a, b, c];
        let p = |i: usize| Vec3::new(verts[i * 3], verts[i * 3 + 1], verts[i * 3 + 2]);
        let (va, vb, vc) = (p(a), p(b), p(c));

        let area = tri_area_2d(&verts[a * 3..a * 3 + 3], &verts[b * 3..b * 3 + 3], &verts[c * 3..c * 3 + 3]);
        if area.abs() <= f32::EPSILON {
            return Err(Error::InvalidMesh(format!("{id}: degenerate triangle")));
        }
        if area < 0.0 {
            return Err(Error::InvalidMesh(format!(
                "{id}: triangle is wound counter-clockwise"
            )));
        }

        let normal = (vb - va).cross(vc - va).normalize_or_zero();
        let plane_d = -normal.dot(va);
        let centroid = (va + vb + vc) / 3.0;

        let corners = [va, vb, vc];
        let mut wall_normals = [Vec2::ZERO; 3];
        let mut wall_midpoints = [Vec3::ZERO; 3];
        for wall in 0..3 {
            let start = corners[wall];
            let end = corners[(wall + 1) % 3];
            wall_normals[wall] = trinav_common::line_normal(
                Vec2::new(start.x, start.z),
                Vec2::new(end.x, end.z),
            );
            wall_midpoints[wall] = (start + end) * 0.5;
        }
        let midpoint_distances = [
            wall_midpoints[0].distance(wall_midpoints[1]),
            wall_midpoints[1].distance(wall_midpoints[2]),
            wall_midpoints[0].distance(wall_midpoints[2]),
        ];

        let bounds = Rect2::from_points(corners.iter().map(|v| Vec2::new(v.x, v.z)))
            .unwrap_or(Rect2::new(Vec2::ZERO, Vec2::ZERO));

        Ok(Self {
            id,
            verts,
            indices,
            normal,
            plane_d,
            centroid,
            bounds,
            wall_normals,
            wall_midpoints,
            midpoint_distances,
            links: [None; 3],
            link_walls: [None; 3],
        })
    }

    pub fn id(&self) -> CellRef {
        self.id
    }

    /// Index of vertex `i` (0..3) in the shared vertex buffer.
    pub fn vertex_index(&self, i: usize) -> usize {
        self.indices[i % 3]
    }

    /// Vertex `i` (0..3) of the triangle.
    #[inline]
    pub fn vertex(&self, i: usize) -> Vec3 {
        let base = self.indices[i % 3] * 3;
        Vec3::new(self.verts[base], self.verts[base + 1], self.verts[base + 2])
    }

    #[inline]
    pub fn vertex_xz(&self, i: usize) -> Vec2 {
        let base = self.indices[i % 3] * 3;
        xz(&self.verts[base..base + 3])
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    #[inline]
    pub fn centroid_xz(&self) -> Vec2 {
        Vec2::new(self.centroid.x, self.centroid.z)
    }

    pub fn bounds(&self) -> &Rect2 {
        &self.bounds
    }

    pub fn wall_midpoint(&self, wall: usize) -> Vec3 {
        self.wall_midpoints[wall % 3]
    }

    /// Endpoints of a wall on the XZ plane.
    #[inline]
    pub fn wall_xz(&self, wall: usize) -> (Vec2, Vec2) {
        (self.vertex_xz(wall), self.vertex_xz(wall + 1))
    }

    /// Neighbor across `wall`, if any.
    #[inline]
    pub fn link(&self, wall: usize) -> Option<CellRef> {
        self.links[wall % 3]
    }

    /// Wall index on the neighbor across `wall`, if linked.
    pub fn link_wall(&self, wall: usize) -> Option<u8> {
        self.link_walls[wall % 3]
    }

    pub fn links(&self) -> &[Option<CellRef>; 3] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.iter().filter(|l| l.is_some()).count()
    }

    /// Wall index through which `neighbor` is linked.
    pub fn link_index(&self, neighbor: CellRef) -> Option<u8> {
        self.links
            .iter()
            .position(|l| *l == Some(neighbor))
            .map(|w| w as u8)
    }

    /// Height of the cell's plane at (x, z).
    #[inline]
    pub fn plane_y(&self, x: f32, z: f32) -> f32 {
        if self.normal.y == 0.0 {
            return 0.0;
        }
        -(self.normal.x * x + self.normal.z * z + self.plane_d) / self.normal.y
    }

    /// Where `p` lies relative to `wall`. `LeftSide` is outside of the cell.
    #[inline]
    pub fn point_relationship(&self, p: Vec2, wall: usize) -> PointLineRelation {
        let start = self.vertex_xz(wall);
        let distance = self.wall_normals[wall % 3].dot(p - start);
        PointLineRelation::from_distance(distance, TOLERANCE_STD)
    }

    /// True if (x, z) lies within the vertical column above and below the cell.
    pub fn is_in_column(&self, x: f32, z: f32) -> bool {
        let p = Vec2::new(x, z);
        (0..3).all(|wall| self.point_relationship(p, wall) != PointLineRelation::LeftSide)
    }

    /// Classifies the segment `start -> end` against this cell.
    pub fn path_relationship(&self, start: Vec2, end: Vec2) -> PathRelationship {
        let mut interior = 0;
        for wall in 0..3 {
            let end_rel = self.point_relationship(end, wall);
            if end_rel != PointLineRelation::LeftSide {
                interior += 1;
                continue;
            }
            if self.point_relationship(start, wall) == PointLineRelation::LeftSide {
                continue;
            }

            let (w0, w1) = self.wall_xz(wall);
            let (relationship, point) = line_relationship(start, end, w0, w1);
            let Some(point) = point else {
                continue;
            };
            let exit_point = match relationship {
                LineRelationship::SegmentsIntersect | LineRelationship::ALineCrossesBSeg => point,
                LineRelationship::BLineCrossesASeg | LineRelationship::LinesIntersect => {
                    // Crossing just beyond a wall end; snap to the vertex.
                    if sloppy_eq_xz(point.x, point.y, w0.x, w0.y, TOLERANCE_STD) {
                        w0
                    } else if sloppy_eq_xz(point.x, point.y, w1.x, w1.y, TOLERANCE_STD) {
                        w1
                    } else {
                        continue;
                    }
                }
                LineRelationship::Collinear | LineRelationship::Parallel => continue,
            };
            return PathRelationship::ExitingCell {
                wall: wall as u8,
                neighbor: self.links[wall],
                exit_point,
            };
        }

        if interior == 3 {
            PathRelationship::EndingCell
        } else {
            PathRelationship::NoRelationship
        }
    }

    /// Moves a point that sits on a vertex toward the centroid by `offset_scale`.
    pub fn safe_point(&self, p: Vec2, offset_scale: f32) -> Vec2 {
        for i in 0..3 {
            let v = self.vertex_xz(i);
            if sloppy_eq_xz(p.x, p.y, v.x, v.y, TOLERANCE_STD) {
                return v + (self.centroid_xz() - v) * offset_scale;
            }
        }
        p
    }

    /// Pulls (x, z) into the cell's column.
    ///
    /// Points outside are moved to where the centroid-to-point segment exits
    /// the cell, then pulled back toward the centroid by `offset_scale`.
    pub fn force_to_column(&self, p: Vec2, offset_scale: f32) -> Vec2 {
        let centroid = self.centroid_xz();
        match self.path_relationship(centroid, p) {
            PathRelationship::ExitingCell { exit_point, .. } => {
                centroid + (exit_point - centroid) * (1.0 - offset_scale)
            }
            PathRelationship::EndingCell => p,
            PathRelationship::NoRelationship => centroid,
        }
    }

    /// Distance between the midpoints of two walls.
    pub fn link_point_distance(&self, from_wall: usize, to_wall: usize) -> f32 {
        match (from_wall % 3, to_wall % 3) {
            (0, 1) | (1, 0) => self.midpoint_distances[0],
            (1, 2) | (2, 1) => self.midpoint_distances[1],
            (0, 2) | (2, 0) => self.midpoint_distances[2],
            _ => 0.0,
        }
    }

    /// Squared distance from a point to the midpoint of `to_wall`.
    pub fn link_point_distance_sq(&self, from: Vec3, to_wall: usize) -> f32 {
        from.distance_squared(self.wall_midpoints[to_wall % 3])
    }

    /// Separating-axis overlap test against an XZ rectangle.
    pub fn intersects(&self, rect: &Rect2) -> bool {
        if !self.bounds.intersects(rect) {
            return false;
        }
        if (0..3).any(|i| rect.contains_point(self.vertex_xz(i))) {
            return true;
        }
        let corners = [
            rect.min,
            Vec2::new(rect.max.x, rect.min.y),
            rect.max,
            Vec2::new(rect.min.x, rect.max.y),
        ];
        (0..3).all(|wall| {
            corners
                .iter()
                .any(|c| self.point_relationship(*c, wall) != PointLineRelation::LeftSide)
        })
    }

    /// Finds the shared wall of `self` and `other`, as (self wall, other wall).
    ///
    /// Both cells are clockwise, so a shared edge appears reversed in the neighbor.
    pub fn shared_wall(&self, other: &TriCell) -> Option<(u8, u8)> {
        for wall in 0..3 {
            let a = self.vertex(wall);
            let b = self.vertex(wall + 1);
            for other_wall in 0..3 {
                if other.vertex(other_wall) == b && other.vertex(other_wall + 1) == a {
                    return Some((wall as u8, other_wall as u8));
                }
            }
        }
        None
    }

    /// Links cells `a` and `b` across their shared wall.
    ///
    /// Returns the wall of `a` used, or `None` if the cells share no wall or a
    /// required slot is already occupied. With `cross_link` the reciprocal slot
    /// on `b` is written too. Only for use while building a mesh.
    pub fn link_cells(cells: &mut [TriCell], a: CellRef, b: CellRef, cross_link: bool) -> Option<u8> {
        if a == b {
            return None;
        }
        let (wall, other_wall) = cells[a.index()].shared_wall(&cells[b.index()])?;
        if cells[a.index()].links[wall as usize].is_some() {
            return None;
        }
        if cross_link && cells[b.index()].links[other_wall as usize].is_some() {
            return None;
        }

        let cell = &mut cells[a.index()];
        cell.links[wall as usize] = Some(b);
        cell.link_walls[wall as usize] = Some(other_wall);
        if cross_link {
            let other = &mut cells[b.index()];
            other.links[other_wall as usize] = Some(a);
            other.link_walls[other_wall as usize] = Some(wall);
        }
        Some(wall)
    }

    /// Approximate closest cell to `point` among `cells`.
    ///
    /// Each candidate is scored by the distance from `point` to where the
    /// centroid-to-point segment exits the cell, or by height difference when
    /// the point is in the cell's column. Cheap, not exact. Returns the cell
    /// and the matching position on it.
    pub fn closest_cell<'a, I>(point: Vec3, cells: I) -> Option<(CellRef, Vec3)>
    where
        I: IntoIterator<Item = &'a TriCell>,
    {
        let target = Vec2::new(point.x, point.z);
        let mut best: Option<(CellRef, Vec3, f32)> = None;
        for cell in cells {
            let (candidate, dist_sq) = match cell.path_relationship(cell.centroid_xz(), target) {
                PathRelationship::ExitingCell { exit_point, .. } => {
                    let p = Vec3::new(
                        exit_point.x,
                        cell.plane_y(exit_point.x, exit_point.y),
                        exit_point.y,
                    );
                    (p, point.distance_squared(p))
                }
                PathRelationship::EndingCell => {
                    let y = cell.plane_y(point.x, point.z);
                    (Vec3::new(point.x, y, point.z), (point.y - y) * (point.y - y))
                }
                PathRelationship::NoRelationship => {
                    (cell.centroid, point.distance_squared(cell.centroid))
                }
            };
            if best.map_or(true, |(_, _, d)| dist_sq < d) {
                best = Some((cell.id, candidate, dist_sq));
            }
        }
        best.map(|(id, p, _)| (id, p))
    }
}
