// Re-export glam for convenience
pub use glam::*;

// Ember math types
mod aabb;
mod fastmath;
mod frame;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use fastmath::{luminance, max_component, safe_sqrt, sqr};
pub use frame::Frame;
pub use ray::{Ray, FORWARD_SHIFT};
pub use transform::Mat4Ext;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3a_creation() {
        let v = Vec3A::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_vec3a_is_simd_sized() {
        // Vec3A carries a dead fourth lane for 128-bit loads
        assert_eq!(std::mem::size_of::<Vec3A>(), 16);
    }
}
