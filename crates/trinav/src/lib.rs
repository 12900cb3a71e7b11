//! Real-time pathfinding on triangle navigation meshes
//!
//! This crate finds and maintains paths for many agents across a mesh of
//! linked triangle cells. Searches are time sliced so a game loop can bound
//! the pathfinding work done per frame.
//!
//! # Features
//!
//! - **Cell Graph**: Clockwise triangles linked across shared walls
//! - **Spatial Index**: Quadtree lookup of the cells under a point
//! - **Resumable A\***: One iteration per call, pooled between requests
//! - **Path Cache**: Completed paths shared by (start cell, goal cell) and aged out
//! - **Repair**: Bounded local searches reconnecting agents to their corridor
//! - **Futures**: Non-blocking request handles that can be polled or waited on
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trinav::{MasterNavigator, NavMeshConfig, NavigatorConfig, TriNavMesh};
//! use trinav_common::TriMesh;
//!
//! let grid = TriMesh::grid(16, 16, 1.0, (0.0, 0.0), 0.0);
//! let mesh = Arc::new(TriNavMesh::from_tri_mesh(&grid, &NavMeshConfig::default())?);
//! let mut navigator = MasterNavigator::new(mesh, NavigatorConfig::default())?;
//!
//! let request = navigator.get_path(start, goal);
//! while !request.is_finished() {
//!     navigator.process(true);
//! }
//! if let Some(path) = request.data() {
//!     let waypoint = path.get_target(agent_position);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`TriNavMesh`]: Immutable cell arena with its [`TriCellQuadTree`]
//! - [`AStarSearch`] and [`RepairSearch`]: Resumable searches over the cells
//! - [`MasterNavigator`]: Scheduler owning pools, jobs and the path cache
//! - [`Navigator`]: Thread-safe client handle of the scheduler
//! - [`ThreadedNavigator`]: Scheduler running on a background thread

pub mod astar_search;
pub mod config;
pub mod distance_heuristic;
pub mod master_path;
pub mod nav_request;
pub mod navigator;
pub mod node_pool;
pub mod quad_tree;
pub mod repair_search;
pub mod status;
pub mod threaded_navigator;
pub mod tri_cell;
pub mod tri_nav_mesh;

pub use astar_search::*;
pub use config::*;
pub use distance_heuristic::*;
pub use master_path::*;
pub use nav_request::*;
pub use navigator::*;
pub use node_pool::*;
pub use quad_tree::*;
pub use repair_search::*;
pub use status::*;
pub use threaded_navigator::*;
pub use tri_cell::*;
pub use tri_nav_mesh::*;

#[cfg(test)]
mod test_mesh_helpers;



#[cfg(test)]
mod concurrency_safety_tests;
