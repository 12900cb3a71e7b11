//! Resumable A* search over the cell graph
//!
//! An [`AStarSearch`] is initialized with start and goal cells and then driven
//! one iteration per [`process`](AStarSearch::process) call, so a scheduler can
//! bound the work done per frame. Instances are meant to be pooled: a new
//! `initialize` discards any in-flight state but keeps allocations.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::distance_heuristic::DistanceHeuristic;
use crate::node_pool::{NodeIndex, NodePool, OpenHeap};
use crate::status::SearchState;
use crate::tri_cell::CellRef;
use crate::tri_nav_mesh::TriNavMesh;

/// One reusable A* search.
#[derive(Debug)]
pub struct AStarSearch {
    heuristic: DistanceHeuristic,
    state: SearchState,
    start: Vec3,
    goal: Vec3,
    start_cell: Option<CellRef>,
    goal_cell: Option<CellRef>,
    pool: NodePool,
    open: OpenHeap,
    open_map: HashMap<CellRef, NodeIndex>,
    closed: HashSet<CellRef>,
    path: Vec<CellRef>,
    iterations: usize,
}

impl AStarSearch {
    pub fn new(heuristic: DistanceHeuristic) -> Self {
        Self {
            heuristic,
            state: SearchState::Uninitialized,
            start: Vec3::ZERO,
            goal: Vec3::ZERO,
            start_cell: None,
            goal_cell: None,
            pool: NodePool::new(),
            open: OpenHeap::new(),
            open_map: HashMap::new(),
            closed: HashSet::new(),
            path: Vec::new(),
            iterations: 0,
        }
    }

    /// Seeds a new search. Any previous state is discarded.
    pub fn initialize(&mut self, start: Vec3, goal: Vec3, start_cell: CellRef, goal_cell: CellRef) {
        self.clear();
        self.start = start;
        self.goal = goal;
        self.start_cell = Some(start_cell);
        self.goal_cell = Some(goal_cell);

        let root = self.pool.alloc(start_cell, None, 0.0, self.heuristic.estimate(start, goal));
        self.open_map.insert(start_cell, root);
        self.open.push(&self.pool, root);
        self.state = SearchState::Initialized;
    }

    /// Runs one iteration and returns the resulting state.
    ///
    /// Finished searches return their terminal state without doing any work.
    pub fn process(&mut self, mesh: &TriNavMesh) -> SearchState {
        let (Some(start_cell), Some(goal_cell)) = (self.start_cell, self.goal_cell) else {
            return self.state;
        };
        match self.state {
            SearchState::Uninitialized | SearchState::Complete | SearchState::Failed => {
                return self.state;
            }
            SearchState::Initialized => {
                self.state = SearchState::Processing;
                if start_cell == goal_cell {
                    self.path.push(start_cell);
                    self.state = SearchState::Complete;
                    return self.state;
                }
            }
            SearchState::Processing => {}
        }

        self.iterations += 1;
        let Some(current) = self.open.pop() else {
            self.state = SearchState::Failed;
            return self.state;
        };
        let current_cell = self.pool.node(current).cell;
        self.open_map.remove(&current_cell);
        self.closed.insert(current_cell);

        if current_cell == goal_cell {
            self.pool.load_path(current, &mut self.path);
            self.state = SearchState::Complete;
            return self.state;
        }

        let cell = mesh.cell(current_cell);
        for wall in 0..3 {
            let Some(next) = cell.link(wall) else {
                continue;
            };
            if self.closed.contains(&next) {
                continue;
            }
            let neighbor = mesh.cell(next);
            if neighbor.link_count() == 1 {
                // Dead end: only worth entering if it is the goal.
                if next == goal_cell {
                    self.pool.load_path(current, &mut self.path);
                    self.path.push(next);
                    self.state = SearchState::Complete;
                    return self.state;
                }
                continue;
            }

            let local_g = local_cost(mesh, &self.pool, self.start, current, wall);
            if let Some(&existing) = self.open_map.get(&next) {
                let candidate = self.pool.g(current) + local_g;
                if candidate < self.pool.g(existing) {
                    self.pool.set_parent(existing, current, local_g);
                    self.open.update(&self.pool, existing);
                }
            } else {
                let h = self.heuristic.estimate(neighbor.centroid(), self.goal);
                let node = self.pool.alloc(next, Some(current), local_g, h);
                self.open_map.insert(next, node);
                self.open.push(&self.pool, node);
            }
        }

        if self.open.is_empty() {
            self.state = SearchState::Failed;
        }
        self.state
    }

    /// Runs iterations until the search finishes.
    pub fn process_to_completion(&mut self, mesh: &TriNavMesh) -> SearchState {
        loop {
            let state = self.process(mesh);
            if state != SearchState::Processing && state != SearchState::Initialized {
                return state;
            }
        }
    }

    /// Returns the search to `Uninitialized`, keeping allocations.
    pub fn reset(&mut self) {
        self.clear();
        self.start_cell = None;
        self.goal_cell = None;
        self.state = SearchState::Uninitialized;
    }

    /// Resets and releases memory beyond `node_capacity` nodes.
    pub fn cleanup(&mut self, node_capacity: usize) {
        self.reset();
        self.pool.shrink_to(node_capacity);
        self.open_map.shrink_to(node_capacity);
        self.closed.shrink_to(node_capacity);
        self.path.shrink_to(node_capacity);
    }

    fn clear(&mut self) {
        self.pool.clear();
        self.open.clear();
        self.open_map.clear();
        self.closed.clear();
        self.path.clear();
        self.iterations = 0;
    }

    /// True if this search runs between the given cells.
    pub fn evaluate(&self, start_cell: CellRef, goal_cell: CellRef) -> bool {
        self.start_cell == Some(start_cell) && self.goal_cell == Some(goal_cell)
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn heuristic(&self) -> DistanceHeuristic {
        self.heuristic
    }

    pub fn set_heuristic(&mut self, heuristic: DistanceHeuristic) {
        self.heuristic = heuristic;
    }

    pub fn start(&self) -> Vec3 {
        self.start
    }

    pub fn goal(&self) -> Vec3 {
        self.goal
    }

    pub fn start_cell(&self) -> Option<CellRef> {
        self.start_cell
    }

    pub fn goal_cell(&self) -> Option<CellRef> {
        self.goal_cell
    }

    /// Cells from start to goal once `Complete`, empty otherwise.
    pub fn path(&self) -> &[CellRef] {
        &self.path
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }
}

/// Cost of moving from node `parent` through its `wall`.
///
/// From the start node this is the straight distance from the start point to
/// the wall midpoint; afterward it is the midpoint-to-midpoint distance across
/// the parent cell.
pub(crate) fn local_cost(
    mesh: &TriNavMesh,
    pool: &NodePool,
    start: Vec3,
    parent: NodeIndex,
    wall: usize,
) -> f32 {
    let node = pool.node(parent);
    let cell = mesh.cell(node.cell);
    match node.parent {
        None => cell.link_point_distance_sq(start, wall).sqrt(),
        Some(grandparent) => {
            let from = pool.node(grandparent).cell;
            match cell.link_index(from) {
                Some(from_wall) => cell.link_point_distance(from_wall as usize, wall),
                None => cell.wall_midpoint(wall).distance(mesh.cell(from).centroid()),
            }
        }
    }
}
