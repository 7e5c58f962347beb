//! Small scalar helpers shared across the renderer.

use glam::Vec3A;

/// x squared.
#[inline]
pub fn sqr(x: f32) -> f32 {
    x * x
}

/// Square root clamped at zero, so float noise below zero never yields NaN.
#[inline]
pub fn safe_sqrt(x: f32) -> f32 {
    x.max(0.0).sqrt()
}

/// Luminance of a linear RGB color (Rec. 709).
#[inline]
pub fn luminance(c: Vec3A) -> f32 {
    0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z
}

/// Largest component of a vector.
#[inline]
pub fn max_component(v: Vec3A) -> f32 {
    v.max_element()
}
