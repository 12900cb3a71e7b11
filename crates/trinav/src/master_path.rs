//! Cached paths and the caller-side path view
//!
//! A [`MasterPath`] is owned by the navigator's cache. Callers receive a
//! [`Path`], a cheap clonable handle that can only read the corridor and steer
//! along it. The navigator may replace the corridor during a repair, which
//! keeps the path id, and disposes the path when it ages out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::{Vec2, Vec3};
use trinav_common::{
    clamp, closest_point_on_segment_xz, translate_toward, tri_area_xz, Error, Result, TOLERANCE_STD,
};

use crate::tri_cell::{CellRef, TriCell};
use crate::tri_nav_mesh::TriNavMesh;

/// Identifier of a cached path.
pub type PathId = u64;

/// Id reported by a disposed path.
pub const NULL_PATH_ID: PathId = 0;

#[derive(Debug, Default)]
pub(crate) struct Corridor {
    pub(crate) cells: Vec<CellRef>,
    // Exit wall of cells[i] toward cells[i + 1]
    pub(crate) walls: Vec<u8>,
    pub(crate) start: Vec3,
}

impl Corridor {
    /// Fills exit walls for the current cells.
    fn link_walls(&mut self, mesh: &TriNavMesh) -> Result<()> {
        self.walls.clear();
        for pair in self.cells.windows(2) {
            let wall = mesh.cell(pair[0]).link_index(pair[1]).ok_or_else(|| {
                Error::Pathfinding(format!("{} is not linked to {}", pair[0], pair[1]))
            })?;
            self.walls.push(wall);
        }
        Ok(())
    }
}

/// A path owned by the navigator's cache.
#[derive(Debug)]
pub struct MasterPath {
    id: AtomicU64,
    mesh: Arc<TriNavMesh>,
    plane_tolerance: f32,
    offset_factor: f32,
    corridor: RwLock<Corridor>,
    disposed: AtomicBool,
}

impl MasterPath {
    /// Creates a path over `cells`, which must be consecutive linked cells.
    ///
    /// `walls` is recycled storage for the exit walls and is cleared first.
    pub fn new(
        id: PathId,
        mesh: Arc<TriNavMesh>,
        cells: Vec<CellRef>,
        walls: Vec<u8>,
        start: Vec3,
    ) -> Result<Self> {
        if cells.is_empty() {
            return Err(Error::Pathfinding("path has no cells".to_string()));
        }
        let mut corridor = Corridor {
            cells,
            walls,
            start,
        };
        corridor.link_walls(&mesh)?;
        Ok(Self {
            id: AtomicU64::new(id),
            plane_tolerance: mesh.plane_tolerance(),
            offset_factor: clamp(mesh.offset_scale(), 0.0, 0.5),
            mesh,
            corridor: RwLock::new(corridor),
            disposed: AtomicBool::new(false),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Corridor> {
        self.corridor.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Corridor> {
        self.corridor.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path id, or [`NULL_PATH_ID`] once disposed.
    pub fn id(&self) -> PathId {
        self.id.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn mesh(&self) -> &Arc<TriNavMesh> {
        &self.mesh
    }

    /// Start point of the current corridor.
    pub fn start(&self) -> Vec3 {
        self.read().start
    }

    pub fn cell_count(&self) -> usize {
        self.read().cells.len()
    }

    /// Snapshot of the corridor cells.
    pub fn cells(&self) -> Vec<CellRef> {
        self.read().cells.clone()
    }

    pub fn start_cell(&self) -> Option<CellRef> {
        self.read().cells.first().copied()
    }

    pub fn goal_cell(&self) -> Option<CellRef> {
        self.read().cells.last().copied()
    }

    /// Index into `cells` of the corridor cell holding `point`.
    ///
    /// Prefers cells whose plane lies within the plane tolerance, furthest
    /// along the corridor first; otherwise the column cell with the nearest
    /// plane.
    fn locate(&self, cells: &[CellRef], point: Vec3) -> Option<usize> {
        let mut nearest: Option<(usize, f32)> = None;
        let mut within: Option<usize> = None;
        for (i, id) in cells.iter().enumerate() {
            let cell = self.mesh.cell(*id);
            if !cell.is_in_column(point.x, point.z) {
                continue;
            }
            let dy = (cell.plane_y(point.x, point.z) - point.y).abs();
            if dy <= self.plane_tolerance {
                within = Some(i);
            }
            if nearest.map_or(true, |(_, d)| dy < d) {
                nearest = Some((i, dy));
            }
        }
        within.or(nearest.map(|(i, _)| i))
    }

    /// True if `point` lies in the column of a corridor cell.
    pub fn is_in_path_column(&self, point: Vec3) -> bool {
        if self.is_disposed() {
            return false;
        }
        let corridor = self.read();
        self.locate(&corridor.cells, point).is_some()
    }

    /// `point` with its height snapped onto the corridor, if in its column.
    pub fn force_y_to_path(&self, point: Vec3) -> Option<Vec3> {
        if self.is_disposed() {
            return None;
        }
        let corridor = self.read();
        let index = self.locate(&corridor.cells, point)?;
        let cell = self.mesh.cell(corridor.cells[index]);
        Some(Vec3::new(point.x, cell.plane_y(point.x, point.z), point.z))
    }

    /// Approximate closest position on the corridor to `point`.
    pub fn force_to_path(&self, point: Vec3) -> Option<Vec3> {
        if self.is_disposed() {
            return None;
        }
        let corridor = self.read();
        TriCell::closest_cell(point, corridor.cells.iter().map(|id| self.mesh.cell(*id)))
            .map(|(_, p)| p)
    }

    /// Next waypoint for an agent at `from` heading for `goal`, a point in
    /// the last corridor cell.
    ///
    /// Returns `None` if the path is disposed or `from` is off the corridor,
    /// which calls for a repair. Corners are pulled toward the opposite end of
    /// their wall by the mesh offset scale, capped at half the wall.
    pub fn get_target(&self, from: Vec3, goal: Vec3) -> Option<Vec3> {
        if self.is_disposed() {
            return None;
        }
        let corridor = self.read();
        let last = corridor.cells.len().checked_sub(1)?;
        let mut index = self.locate(&corridor.cells, from)?;
        if index == last {
            return Some(goal);
        }

        let apex = Vec2::new(from.x, from.z);
        // Standing on a portal: that portal is already passed.
        while index < last {
            let (left, right) = self.portal(&corridor, index);
            let on_portal = closest_point_on_segment_xz(
                apex,
                Vec2::new(left.x, left.z),
                Vec2::new(right.x, right.z),
            );
            if apex.distance_squared(on_portal) <= TOLERANCE_STD * TOLERANCE_STD {
                index += 1;
            } else {
                break;
            }
        }
        if index == last {
            return Some(goal);
        }

        let mut portal_left = apex;
        let mut portal_right = apex;
        let mut left_corner = (Vec3::ZERO, Vec3::ZERO);
        let mut right_corner = (Vec3::ZERO, Vec3::ZERO);

        for i in index..=last {
            let (left, right) = if i < last {
                self.portal(&corridor, i)
            } else {
                (goal, goal)
            };
            let left_xz = Vec2::new(left.x, left.z);
            let right_xz = Vec2::new(right.x, right.z);

            if tri_area_xz(apex, portal_right, right_xz) <= 0.0 {
                if portal_right == apex || tri_area_xz(apex, portal_left, right_xz) > 0.0 {
                    portal_right = right_xz;
                    right_corner = (right, left);
                } else {
                    return Some(translate_toward(left_corner.0, left_corner.1, self.offset_factor));
                }
            }

            if tri_area_xz(apex, portal_left, left_xz) >= 0.0 {
                if portal_left == apex || tri_area_xz(apex, portal_right, left_xz) < 0.0 {
                    portal_left = left_xz;
                    left_corner = (left, right);
                } else {
                    return Some(translate_toward(right_corner.0, right_corner.1, self.offset_factor));
                }
            }
        }
        Some(goal)
    }

    /// Left and right endpoints of the exit wall of corridor cell `index`.
    fn portal(&self, corridor: &Corridor, index: usize) -> (Vec3, Vec3) {
        let cell = self.mesh.cell(corridor.cells[index]);
        let wall = corridor.walls[index] as usize;
        (cell.vertex(wall), cell.vertex(wall + 1))
    }

    /// Replaces the corridor, keeping the id. Returns the old storage.
    pub(crate) fn replace_corridor(
        &self,
        cells: Vec<CellRef>,
        walls: Vec<u8>,
        start: Vec3,
    ) -> Result<(Vec<CellRef>, Vec<u8>)> {
        let mut next = Corridor { cells, walls, start };
        if next.cells.is_empty() {
            return Err(Error::Pathfinding("path has no cells".to_string()));
        }
        next.link_walls(&self.mesh)?;
        let mut corridor = self.write();
        let old = std::mem::replace(&mut *corridor, next);
        Ok((old.cells, old.walls))
    }

    /// Drops the corridor cells before `index` and moves the start point.
    pub(crate) fn truncate_front(&self, index: usize, start: Vec3) {
        let mut corridor = self.write();
        let index = index.min(corridor.cells.len().saturating_sub(1));
        corridor.cells.drain(..index);
        let walls = index.min(corridor.walls.len());
        corridor.walls.drain(..walls);
        corridor.start = start;
    }

    /// Marks the path disposed and hands back its storage for reuse.
    pub(crate) fn dispose(&self) -> Option<(Vec<CellRef>, Vec<u8>)> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.id.store(NULL_PATH_ID, Ordering::Release);
        let mut corridor = self.write();
        let cells = std::mem::take(&mut corridor.cells);
        let walls = std::mem::take(&mut corridor.walls);
        Some((cells, walls))
    }
}

/// Caller-side view of a cached path.
///
/// Requests ending in the same goal cell share one corridor, but each view
/// keeps the goal point its caller asked for.
#[derive(Debug, Clone)]
pub struct Path {
    root: Arc<MasterPath>,
    goal: Vec3,
}

impl Path {
    pub(crate) fn new(root: Arc<MasterPath>, goal: Vec3) -> Self {
        Self { root, goal }
    }

    pub(crate) fn master(&self) -> &Arc<MasterPath> {
        &self.root
    }

    /// Path id, or [`NULL_PATH_ID`] once disposed.
    pub fn id(&self) -> PathId {
        self.root.id()
    }

    pub fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }

    pub fn start(&self) -> Vec3 {
        self.root.start()
    }

    pub fn goal(&self) -> Vec3 {
        self.goal
    }

    pub fn cell_count(&self) -> usize {
        self.root.cell_count()
    }

    /// Snapshot of the corridor cells.
    pub fn cells(&self) -> Vec<CellRef> {
        self.root.cells()
    }

    /// Next waypoint for an agent at `from`, `None` when off the corridor.
    pub fn get_target(&self, from: Vec3) -> Option<Vec3> {
        self.root.get_target(from, self.goal)
    }

    pub fn is_in_path_column(&self, point: Vec3) -> bool {
        self.root.is_in_path_column(point)
    }

    pub fn force_to_path(&self, point: Vec3) -> Option<Vec3> {
        self.root.force_to_path(point)
    }

    pub fn force_y_to_path(&self, point: Vec3) -> Option<Vec3> {
        self.root.force_y_to_path(point)
    }

    /// True if both handles refer to the same cached path.
    pub fn same_path(&self, other: &Path) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.same_path(other)
    }
}

impl Eq for Path {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::*;
    use crate::{AStarSearch, DistanceHeuristic, SearchState};

    fn build_path(mesh: &Arc<TriNavMesh>, start: Vec3, goal: Vec3) -> Result<Path> {
        let (sc, _) = mesh.closest_cell(start, true).ok_or_else(|| Error::Pathfinding("start".into()))?;
        let (gc, _) = mesh.closest_cell(goal, true).ok_or_else(|| Error::Pathfinding("goal".into()))?;
        let mut search = AStarSearch::new(DistanceHeuristic::LongestAxis);
        search.initialize(start, goal, sc, gc);
        assert_eq!(search.process_to_completion(mesh), SearchState::Complete);
        let master = MasterPath::new(7, mesh.clone(), search.path().to_vec(), Vec::new(), start)?;
        Ok(Path::new(Arc::new(master), goal))
    }

    fn walk(path: &Path, mut position: Vec3) -> Vec<Vec3> {
        let mut waypoints = Vec::new();
        for _ in 0..64 {
            let Some(target) = path.get_target(position) else {
                break;
            };
            waypoints.push(target);
            if target == path.goal() {
                break;
            }
            position = target;
        }
        waypoints
    }

    #[test]
    fn test_rejects_unlinked_cells() -> Result<()> {
        let mesh = Arc::new(create_grid_mesh(3, 1)?);
        let cells = vec![CellRef::new(0), CellRef::new(4)];
        assert!(MasterPath::new(1, mesh.clone(), cells, Vec::new(), Vec3::ZERO).is_err());
        assert!(MasterPath::new(1, mesh, Vec::new(), Vec::new(), Vec3::ZERO).is_err());
        Ok(())
    }

    #[test]
    fn test_straight_corridor_goes_to_goal() -> Result<()> {
        let mesh = Arc::new(create_corridor_mesh(5)?);
        let start = Vec3::new(0.2, 0.0, 0.5);
        let goal = Vec3::new(4.8, 0.0, 0.5);
        let path = build_path(&mesh, start, goal)?;
        assert_eq!(path.id(), 7);
        assert_eq!(path.cell_count(), 10);
        assert_eq!(path.get_target(start), Some(goal));
        assert_eq!(path.get_target(goal), Some(goal));
        Ok(())
    }

    #[test]
    fn test_turns_around_corner() -> Result<()> {
        // L-shaped region: bottom row plus the left column of a 3x3 grid
        let grid = trinav_common::TriMesh::grid(3, 3, 1.0, (0.0, 0.0), 0.0);
        let mut indices = Vec::new();
        for (i, tri) in grid.indices.chunks_exact(3).enumerate() {
            let quad = i / 2;
            let (qi, qj) = (quad / 3, quad % 3);
            if qj == 0 || qi == 0 {
                indices.extend_from_slice(tri);
            }
        }
        let mesh = Arc::new(TriNavMesh::build(&grid.vertices, &indices, &test_mesh_config())?);
        let start = Vec3::new(2.5, 0.0, 0.5);
        let goal = Vec3::new(0.5, 0.0, 2.5);
        let path = build_path(&mesh, start, goal)?;

        let first = path.get_target(start).ok_or_else(|| Error::Pathfinding("target".into()))?;
        assert_ne!(first, goal);
        // The inner corner (1, 1) pulled toward the far side of its wall
        assert!(first.distance(Vec3::new(1.0, 0.0, 1.0)) <= 0.1 * 2f32.sqrt() + 1e-4);

        let waypoints = walk(&path, start);
        assert_eq!(waypoints.last(), Some(&goal));
        Ok(())
    }

    #[test]
    fn test_off_corridor_and_disposal() -> Result<()> {
        let mesh = Arc::new(create_grid_mesh(4, 4)?);
        let start = Vec3::new(0.2, 0.0, 0.2);
        let goal = Vec3::new(3.8, 0.0, 0.4);
        let path = build_path(&mesh, start, goal)?;

        let off = Vec3::new(1.5, 0.0, 3.5);
        assert!(path.get_target(off).is_none());
        assert!(!path.is_in_path_column(off));
        assert!(path.is_in_path_column(Vec3::new(2.5, 5.0, 0.2)));
        assert_eq!(path.force_y_to_path(Vec3::new(2.5, 5.0, 0.2)), Some(Vec3::new(2.5, 0.0, 0.2)));
        assert!(path.force_y_to_path(off).is_none());

        let forced = path.force_to_path(off).ok_or_else(|| Error::Pathfinding("force".into()))?;
        assert!(path.is_in_path_column(forced));

        let storage = path.master().dispose();
        assert!(storage.is_some_and(|(cells, _)| !cells.is_empty()));
        assert!(path.master().dispose().is_none());
        assert!(path.is_disposed());
        assert_eq!(path.id(), NULL_PATH_ID);
        assert!(path.get_target(start).is_none());
        assert!(path.force_to_path(start).is_none());
        Ok(())
    }

    #[test]
    fn test_replace_and_truncate() -> Result<()> {
        let mesh = Arc::new(create_corridor_mesh(4)?);
        let path = build_path(&mesh, centroid(&mesh, 2), centroid(&mesh, 7))?;
        assert_eq!(path.cells(), (2..8).map(CellRef::new).collect::<Vec<_>>());

        let (old, _) = path.master().replace_corridor(
            (0..8).map(CellRef::new).collect(),
            Vec::new(),
            centroid(&mesh, 0),
        )?;
        assert_eq!(old.len(), 6);
        assert_eq!(path.cell_count(), 8);
        assert_eq!(path.id(), 7);
        assert_eq!(path.start(), centroid(&mesh, 0));

        path.master().truncate_front(3, centroid(&mesh, 3));
        assert_eq!(path.master().start_cell(), Some(CellRef::new(3)));
        assert_eq!(path.master().goal_cell(), Some(CellRef::new(7)));
        assert_eq!(path.get_target(centroid(&mesh, 3)), Some(path.goal()));

        assert!(path
            .master()
            .replace_corridor(vec![CellRef::new(0), CellRef::new(5)], Vec::new(), Vec3::ZERO)
            .is_err());
        assert_eq!(path.cell_count(), 5);
        Ok(())
    }

    #[test]
    fn test_path_view_equality() -> Result<()> {
        let mesh = Arc::new(create_two_cell_mesh()?);
        let view = build_path(&mesh, centroid(&mesh, 0), centroid(&mesh, 1))?;
        let other = build_path(&mesh, centroid(&mesh, 0), centroid(&mesh, 1))?;
        assert_eq!(view, view.clone());
        assert_ne!(view, other);
        assert_eq!(view.id(), view.master().id());
        assert_eq!(view.cell_count(), 2);
        Ok(())
    }

    #[test]
    fn test_views_keep_their_own_goal() -> Result<()> {
        let mesh = Arc::new(create_corridor_mesh(5)?);
        let start = Vec3::new(0.2, 0.0, 0.5);
        let near = Vec3::new(4.1, 0.0, 0.3);
        let far = Vec3::new(4.3, 0.0, 0.5);
        let first = build_path(&mesh, start, near)?;
        let second = Path::new(Arc::clone(first.master()), far);

        assert!(first.same_path(&second));
        assert_eq!(first.goal(), near);
        assert_eq!(second.goal(), far);
        assert_eq!(walk(&first, start).last(), Some(&near));
        assert_eq!(walk(&second, start).last(), Some(&far));
        Ok(())
    }
}
