//! 2D geometry operations on the XZ plane
//!
//! Cells, the spatial index and the path funnel all reason about the
//! projection of the mesh onto the ground plane. Points are passed either as
//! `[x, y, z]` slices (vertex buffer views) or as [`Vec2`] where `y` carries
//! world z.

use crate::Vec2;

/// Standard tolerance used for side-of-line and snapping tests.
pub const TOLERANCE_STD: f32 = 0.0001;

/// Calculate twice the signed area of a 2D triangle on the XZ plane.
///
/// The sign indicates the winding order:
/// - Positive: clockwise (when looking down Y axis)
/// - Negative: counter-clockwise (when looking down Y axis)
/// - Zero: degenerate (collinear points)
#[inline]
pub fn tri_area_2d(a: &[f32], b: &[f32], c: &[f32]) -> f32 {
    let abx = b[0] - a[0];
    let abz = b[2] - a[2];
    let acx = c[0] - a[0];
    let acz = c[2] - a[2];
    acx * abz - abx * acz
}

/// Twice the signed area of a triangle given as projected points.
#[inline]
pub fn tri_area_xz(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    let ab = b - a;
    let ac = c - a;
    ac.x * ab.y - ab.x * ac.y
}

/// Projects a vertex buffer view onto the XZ plane.
#[inline]
pub fn xz(v: &[f32]) -> Vec2 {
    Vec2::new(v[0], v[2])
}

/// Where a point lies relative to a directed line.
///
/// For a clockwise triangle, a point on the left of a wall is outside of the
/// triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLineRelation {
    LeftSide,
    RightSide,
    OnLine,
}

impl PointLineRelation {
    /// Classifies a signed distance against a tolerance.
    #[inline]
    pub fn from_distance(distance: f32, tolerance: f32) -> Self {
        if distance < -tolerance {
            PointLineRelation::LeftSide
        } else if distance > tolerance {
            PointLineRelation::RightSide
        } else {
            PointLineRelation::OnLine
        }
    }
}

/// Unit normal of the directed line `a -> b`, pointing to its right side.
///
/// Returns zero for a degenerate line.
#[inline]
pub fn line_normal(a: Vec2, b: Vec2) -> Vec2 {
    let dir = (b - a).normalize_or_zero();
    Vec2::new(dir.y, -dir.x)
}

/// Classifies `p` against the directed line `a -> b`.
pub fn point_line_relation(p: Vec2, a: Vec2, b: Vec2, tolerance: f32) -> PointLineRelation {
    let distance = line_normal(a, b).dot(p - a);
    PointLineRelation::from_distance(distance, tolerance)
}

/// Relationship between two 2D lines `A = a0 -> a1` and `B = b0 -> b1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRelationship {
    /// Both segments contain the intersection point.
    SegmentsIntersect,
    /// The infinite line through A crosses segment B, but segment A stops short.
    ALineCrossesBSeg,
    /// The infinite line through B crosses segment A, but segment B stops short.
    BLineCrossesASeg,
    /// The lines intersect outside of both segments.
    LinesIntersect,
    Collinear,
    Parallel,
}

impl LineRelationship {
    /// True when the lines meet at a single point.
    pub fn has_intersection(self) -> bool {
        !matches!(self, LineRelationship::Collinear | LineRelationship::Parallel)
    }
}

/// Computes how two lines relate and where they intersect.
///
/// The intersection point is only returned for non-parallel lines.
pub fn line_relationship(
    a0: Vec2,
    a1: Vec2,
    b0: Vec2,
    b1: Vec2,
) -> (LineRelationship, Option<Vec2>) {
    let da = a1 - a0;
    let db = b1 - b0;
    let denom = db.y * da.x - db.x * da.y;
    let numer_a = db.x * (a0.y - b0.y) - db.y * (a0.x - b0.x);
    let numer_b = da.x * (a0.y - b0.y) - da.y * (a0.x - b0.x);

    if denom == 0.0 {
        if numer_a == 0.0 && numer_b == 0.0 {
            return (LineRelationship::Collinear, None);
        }
        return (LineRelationship::Parallel, None);
    }

    let factor_a = numer_a / denom;
    let factor_b = numer_b / denom;
    let point = a0 + da * factor_a;

    let on_a = (0.0..=1.0).contains(&factor_a);
    let on_b = (0.0..=1.0).contains(&factor_b);
    let relationship = match (on_a, on_b) {
        (true, true) => LineRelationship::SegmentsIntersect,
        (false, true) => LineRelationship::ALineCrossesBSeg,
        (true, false) => LineRelationship::BLineCrossesASeg,
        (false, false) => LineRelationship::LinesIntersect,
    };
    (relationship, Some(point))
}

/// Closest point on segment `a -> b` to `p`.
pub fn closest_point_on_segment_xz(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Axis-aligned rectangle on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect2 {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Smallest rectangle containing all points.
    pub fn from_points<I: IntoIterator<Item = Vec2>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Self::new(first, first);
        for p in iter {
            rect.min = rect.min.min(p);
            rect.max = rect.max.max(p);
        }
        Some(rect)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Inclusive point containment.
    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True if `other` lies fully inside this rectangle.
    #[inline]
    pub fn contains_rect(&self, other: &Rect2) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    /// Inclusive overlap test.
    #[inline]
    pub fn intersects(&self, other: &Rect2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Grows the rectangle by `amount` on every side.
    pub fn expanded(&self, amount: f32) -> Rect2 {
        Rect2::new(self.min - Vec2::splat(amount), self.max + Vec2::splat(amount))
    }

    /// Splits into four quadrants: (min x, min z), (max x, min z), (min x, max z), (max x, max z).
    pub fn quadrants(&self) -> [Rect2; 4] {
        let c = self.center();
        [
            Rect2::new(self.min, c),
            Rect2::new(Vec2::new(c.x, self.min.y), Vec2::new(self.max.x, c.y)),
            Rect2::new(Vec2::new(self.min.x, c.y), Vec2::new(c.x, self.max.y)),
            Rect2::new(c, self.max),
        ]
    }
}
