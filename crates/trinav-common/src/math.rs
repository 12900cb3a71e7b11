//! Small numeric helpers

use glam::Vec3;

/// Square a value (x²)
#[inline]
pub fn sqr(a: f32) -> f32 {
    a * a
}

/// Clamps a value between min and max
#[inline]
pub fn clamp<T: PartialOrd>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

/// Equality within an absolute tolerance.
#[inline]
pub fn sloppy_eq(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() <= tolerance
}

/// Component-wise [`sloppy_eq`] on the XZ plane.
#[inline]
pub fn sloppy_eq_xz(ax: f32, az: f32, bx: f32, bz: f32, tolerance: f32) -> bool {
    sloppy_eq(ax, bx, tolerance) && sloppy_eq(az, bz, tolerance)
}

/// Moves `from` toward `to` by `factor` of the distance between them.
#[inline]
pub fn translate_toward(from: Vec3, to: Vec3, factor: f32) -> Vec3 {
    from + (to - from) * factor
}
