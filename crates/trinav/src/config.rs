//! Configuration for mesh building and request scheduling

use std::time::Duration;

use trinav_common::{Error, Result};

use crate::distance_heuristic::DistanceHeuristic;

/// Parameters for building a [`TriNavMesh`](crate::TriNavMesh).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct NavMeshConfig {
    /// Maximum depth of the spatial quadtree
    pub spatial_depth: u32,
    /// Vertical distance within which a point counts as on a cell
    pub plane_tolerance: f32,
    /// Fraction used to nudge points off walls and vertices into cells
    pub offset_scale: f32,
}

impl Default for NavMeshConfig {
    fn default() -> Self {
        Self {
            spatial_depth: 8,
            plane_tolerance: 0.5,
            offset_scale: 0.1,
        }
    }
}

impl NavMeshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spatial_depth(mut self, spatial_depth: u32) -> Self {
        self.spatial_depth = spatial_depth;
        self
    }

    pub fn with_plane_tolerance(mut self, plane_tolerance: f32) -> Self {
        self.plane_tolerance = plane_tolerance;
        self
    }

    pub fn with_offset_scale(mut self, offset_scale: f32) -> Self {
        self.offset_scale = offset_scale;
        self
    }

    /// Rejects values that cannot be clamped into range.
    pub fn validate(&self) -> Result<()> {
        if !self.plane_tolerance.is_finite() {
            return Err(Error::InvalidConfig(
                "plane tolerance must be finite".to_string(),
            ));
        }
        if !self.offset_scale.is_finite() || self.offset_scale > 1.0 {
            return Err(Error::InvalidConfig(
                "offset scale must be a finite fraction no larger than 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Plane tolerance raised to at least `f32::EPSILON`.
    pub fn effective_plane_tolerance(&self) -> f32 {
        self.plane_tolerance.max(f32::EPSILON)
    }

    /// Offset scale clamped to at least zero.
    pub fn effective_offset_scale(&self) -> f32 {
        self.offset_scale.max(0.0)
    }
}

/// Parameters for a [`MasterNavigator`](crate::MasterNavigator).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct NavigatorConfig {
    /// Heuristic for path searches
    pub heuristic: DistanceHeuristic,
    /// Time budget of one `process` call
    pub max_frame_timeslice: Duration,
    /// Cached paths untouched for longer than this are evicted. Zero disables caching.
    pub max_path_age: Duration,
    /// Maximum corridor length of a repair search
    pub repair_search_depth: u32,
    /// Number of path searches that may run concurrently
    pub search_pool_size: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            heuristic: DistanceHeuristic::LongestAxis,
            max_frame_timeslice: Duration::from_millis(1),
            max_path_age: Duration::from_secs(60),
            repair_search_depth: 4,
            search_pool_size: 40,
        }
    }
}

impl NavigatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heuristic(mut self, heuristic: DistanceHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_max_frame_timeslice(mut self, max_frame_timeslice: Duration) -> Self {
        self.max_frame_timeslice = max_frame_timeslice;
        self
    }

    pub fn with_max_path_age(mut self, max_path_age: Duration) -> Self {
        self.max_path_age = max_path_age;
        self
    }

    pub fn with_repair_search_depth(mut self, repair_search_depth: u32) -> Self {
        self.repair_search_depth = repair_search_depth;
        self
    }

    pub fn with_search_pool_size(mut self, search_pool_size: usize) -> Self {
        self.search_pool_size = search_pool_size;
        self
    }

    /// Raises the repair depth and pool size to at least one.
    pub fn normalized(mut self) -> Self {
        self.repair_search_depth = self.repair_search_depth.max(1);
        self.search_pool_size = self.search_pool_size.max(1);
        self
    }

    /// Capacity of the repair pool derived from the search pool size.
    pub fn repair_pool_size(&self) -> usize {
        let size = self.search_pool_size.max(1);
        if size < 3 {
            size
        } else {
            (size / 2).max(1)
        }
    }

    /// True when completed paths are kept in the cache.
    pub fn caching_enabled(&self) -> bool {
        !self.max_path_age.is_zero()
    }
}

/// Parameters for a [`ThreadedNavigator`](crate::ThreadedNavigator).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadedNavigatorConfig {
    pub navigator: NavigatorConfig,
    /// Target duration of one loop iteration
    pub frame_length: Duration,
    /// Interval between maintenance passes
    pub maintenance_frequency: Duration,
}

impl Default for ThreadedNavigatorConfig {
    fn default() -> Self {
        Self {
            navigator: NavigatorConfig::default(),
            frame_length: Duration::from_millis(10),
            maintenance_frequency: Duration::from_millis(500),
        }
    }
}

impl ThreadedNavigatorConfig {
    pub fn new(navigator: NavigatorConfig) -> Self {
        Self {
            navigator,
            ..Self::default()
        }
    }

    pub fn with_frame_length(mut self, frame_length: Duration) -> Self {
        self.frame_length = frame_length;
        self
    }

    pub fn with_maintenance_frequency(mut self, maintenance_frequency: Duration) -> Self {
        self.maintenance_frequency = maintenance_frequency;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_length.is_zero() {
            return Err(Error::InvalidConfig(
                "frame length must be positive".to_string(),
            ));
        }
        if self.maintenance_frequency.is_zero() {
            return Err(Error::InvalidConfig(
                "maintenance frequency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
