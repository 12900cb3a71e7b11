//! Common utilities and data structures shared by the trinav crates
//!
//! Geometry here works on the XZ plane (Y-up coordinate system). Triangles are
//! expected to be wound clockwise when viewed from above, which is the winding
//! for which [`tri_area_2d`] is positive.

mod geometry;
mod math;
mod mesh;

pub use geometry::*;
pub use math::*;
pub use mesh::*;

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Represents a point projected onto the XZ plane (`x` is world x, `y` is world z)
pub type Vec2 = glam::Vec2;

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input mesh: {0}")]
    InvalidMesh(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pathfinding failed: {0}")]
    Pathfinding(String),

    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for trinav operations
pub type Result<T> = std::result::Result<T, Error>;
