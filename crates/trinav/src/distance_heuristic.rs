//! Distance estimates used by the A* search

use glam::Vec3;

/// Heuristic used to estimate the remaining cost to the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum DistanceHeuristic {
    /// Largest absolute axis difference
    #[default]
    LongestAxis,
    /// Sum of absolute axis differences
    Manhattan,
    /// Straight-line distance
    Euclidean,
}

impl DistanceHeuristic {
    /// Estimated cost between two points.
    #[inline]
    pub fn estimate(self, from: Vec3, to: Vec3) -> f32 {
        let d = (to - from).abs();
        match self {
            DistanceHeuristic::LongestAxis => d.max_element(),
            DistanceHeuristic::Manhattan => d.x + d.y + d.z,
            DistanceHeuristic::Euclidean => d.length(),
        }
    }
}

impl std::str::FromStr for DistanceHeuristic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "longest-axis" | "longest_axis" | "longestaxis" => Ok(DistanceHeuristic::LongestAxis),
            "manhattan" => Ok(DistanceHeuristic::Manhattan),
            "euclidean" => Ok(DistanceHeuristic::Euclidean),
            other => Err(format!("unknown heuristic '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimates() {
        let a = Vec3::new(1.0, 0.0, -1.0);
        let b = Vec3::new(4.0, 1.0, 3.0);
        assert_eq!(DistanceHeuristic::LongestAxis.estimate(a, b), 4.0);
        assert_eq!(DistanceHeuristic::Manhattan.estimate(a, b), 8.0);
        assert!((DistanceHeuristic::Euclidean.estimate(a, b) - 26.0f32.sqrt()).abs() < 1e-6);
        assert_eq!(DistanceHeuristic::Manhattan.estimate(b, b), 0.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("manhattan".parse::<DistanceHeuristic>(), Ok(DistanceHeuristic::Manhattan));
        assert_eq!("Longest-Axis".parse::<DistanceHeuristic>(), Ok(DistanceHeuristic::LongestAxis));
        assert!("chebyshev".parse::<DistanceHeuristic>().is_err());
    }
}
