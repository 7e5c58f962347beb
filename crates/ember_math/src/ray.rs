//! Ray type for path tracing.
//!
//! Origin, direction and their reciprocals are stored as `Vec3A` so the
//! AABB slab test can use 128-bit loads; the fourth lane is padding.

use glam::Vec3A;

/// Offset applied by [`Ray::shifted`] to step off a surface before
/// spawning a secondary ray.
pub const FORWARD_SHIFT: f32 = 5e-4;

/// A ray with precomputed direction reciprocals.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray
    origin: Vec3A,
    /// Direction vector (unit length)
    direction: Vec3A,
    /// 1 / direction, clamped to finite values
    recip: Vec3A,
    /// |1 / direction|, clamped to finite values
    recip_abs: Vec3A,
}

impl Ray {
    /// Create a new ray. `direction` must be unit length.
    #[inline]
    pub fn new(origin: Vec3A, direction: Vec3A) -> Self {
        debug_assert!(
            (direction.length_squared() - 1.0).abs() < 1e-3,
            "ray direction must be unit length"
        );
        // A zero component yields +-inf; clamp so slab arithmetic stays finite.
        let recip = (Vec3A::ONE / direction).clamp(Vec3A::splat(f32::MIN), Vec3A::splat(f32::MAX));
        Self {
            origin,
            direction,
            recip,
            recip_abs: recip.abs(),
        }
    }

    /// Create a ray whose origin is shifted forward along the direction,
    /// stepping off the spawning surface to avoid self-intersection.
    #[inline]
    pub fn shifted(origin: Vec3A, direction: Vec3A) -> Self {
        Self::new(origin + direction * FORWARD_SHIFT, direction)
    }

    /// Get the ray's origin point.
    #[inline]
    pub fn origin(&self) -> Vec3A {
        self.origin
    }

    /// Get the ray's direction vector.
    #[inline]
    pub fn direction(&self) -> Vec3A {
        self.direction
    }

    /// Get the clamped reciprocal of the direction.
    #[inline]
    pub fn recip(&self) -> Vec3A {
        self.recip
    }

    /// Get the absolute clamped reciprocal of the direction.
    #[inline]
    pub fn recip_abs(&self) -> Vec3A {
        self.recip_abs
    }

    /// Compute a point along the ray at parameter t.
    /// P(t) = origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3A {
        self.origin + t * self.direction
    }
}
