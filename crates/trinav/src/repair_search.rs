//! Bounded-depth search reconnecting a position to an existing corridor
//!
//! A uniform-cost search from the cell holding a drifted position toward every
//! cell of a corridor. Nodes are not expanded once their path holds
//! `max_depth` cells, which keeps repairs local and cheap. When several
//! corridor cells are reached, the one furthest along the corridor wins.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::astar_search::local_cost;
use crate::node_pool::{NodeIndex, NodePool, OpenHeap};
use crate::status::SearchState;
use crate::tri_cell::CellRef;
use crate::tri_nav_mesh::TriNavMesh;

/// One reusable repair search.
#[derive(Debug, Default)]
pub struct RepairSearch {
    state: SearchState,
    start: Vec3,
    start_cell: Option<CellRef>,
    max_depth: usize,
    // Corridor cell -> index in the corridor
    goals: HashMap<CellRef, usize>,
    pool: NodePool,
    open: OpenHeap,
    open_map: HashMap<CellRef, NodeIndex>,
    closed: HashSet<CellRef>,
    best: Option<usize>,
    path: Vec<CellRef>,
    iterations: usize,
}

impl RepairSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a search from `start_cell` toward any cell of `corridor`.
    pub fn initialize(&mut self, start: Vec3, start_cell: CellRef, corridor: &[CellRef], max_depth: usize) {
        self.clear();
        self.start = start;
        self.start_cell = Some(start_cell);
        self.max_depth = max_depth.max(1);
        self.goals
            .extend(corridor.iter().enumerate().map(|(i, c)| (*c, i)));

        let root = self.pool.alloc(start_cell, None, 0.0, 0.0);
        self.open_map.insert(start_cell, root);
        self.open.push(&self.pool, root);
        self.state = SearchState::Initialized;
    }

    /// Runs one iteration and returns the resulting state.
    pub fn process(&mut self, mesh: &TriNavMesh) -> SearchState {
        let Some(start_cell) = self.start_cell else {
            return self.state;
        };
        if self.state.is_finished() || self.state == SearchState::Uninitialized {
            return self.state;
        }
        self.iterations += 1;
        if self.state == SearchState::Initialized {
            self.state = SearchState::Processing;
            if let Some(&index) = self.goals.get(&start_cell) {
                self.path.push(start_cell);
                self.best = Some(index);
                self.state = SearchState::Complete;
                return self.state;
            }
        }

        let Some(current) = self.open.pop() else {
            return self.finish();
        };
        let current_cell = self.pool.node(current).cell;
        self.open_map.remove(&current_cell);
        self.closed.insert(current_cell);
        let depth = self.pool.path_size(current);

        let cell = mesh.cell(current_cell);
        for wall in 0..3 {
            let Some(next) = cell.link(wall) else {
                continue;
            };
            if self.closed.contains(&next) {
                continue;
            }

            if let Some(index) = self.goals.remove(&next) {
                if self.best.map_or(true, |best| index > best) {
                    self.best = Some(index);
                    self.path.clear();
                    self.pool.load_path(current, &mut self.path);
                    self.path.push(next);
                }
                if self.goals.is_empty() {
                    return self.finish();
                }
                continue;
            }

            if mesh.cell(next).link_count() == 1 {
                self.closed.insert(next);
                continue;
            }
            if depth >= self.max_depth {
                continue;
            }

            let local_g = local_cost(mesh, &self.pool, self.start, current, wall);
            if let Some(&existing) = self.open_map.get(&next) {
                if self.pool.g(current) + local_g < self.pool.g(existing) {
                    self.pool.set_parent(existing, current, local_g);
                    self.open.update(&self.pool, existing);
                }
            } else {
                let node = self.pool.alloc(next, Some(current), local_g, 0.0);
                self.open_map.insert(next, node);
                self.open.push(&self.pool, node);
            }
        }

        if self.open.is_empty() {
            return self.finish();
        }
        self.state
    }

    /// Runs iterations until the search finishes.
    pub fn process_to_completion(&mut self, mesh: &TriNavMesh) -> SearchState {
        while !self.process(mesh).is_finished() {
            if self.state == SearchState::Uninitialized {
                break;
            }
        }
        self.state
    }

    fn finish(&mut self) -> SearchState {
        self.state = if self.best.is_some() {
            SearchState::Complete
        } else {
            SearchState::Failed
        };
        self.state
    }

    pub fn reset(&mut self) {
        self.clear();
        self.start_cell = None;
        self.state = SearchState::Uninitialized;
    }

    /// Resets and releases memory beyond `node_capacity` nodes.
    pub fn cleanup(&mut self, node_capacity: usize) {
        self.reset();
        self.pool.shrink_to(node_capacity);
        self.open_map.shrink_to(node_capacity);
        self.closed.shrink_to(node_capacity);
        self.goals.shrink_to(node_capacity);
    }

    fn clear(&mut self) {
        self.pool.clear();
        self.open.clear();
        self.open_map.clear();
        self.closed.clear();
        self.goals.clear();
        self.path.clear();
        self.best = None;
        self.iterations = 0;
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn start_cell(&self) -> Option<CellRef> {
        self.start_cell
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Corridor index reached and the cells from the start cell to it,
    /// once `Complete`.
    pub fn result(&self) -> Option<(usize, &[CellRef])> {
        if self.state != SearchState::Complete {
            return None;
        }
        self.best.map(|index| (index, self.path.as_slice()))
    }
}
