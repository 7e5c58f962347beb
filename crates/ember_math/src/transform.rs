// Transform utilities for Mat4
//
// Extends glam::Mat4 with convenience methods for scene flattening.
// Note: glam::Mat4 already provides transform_point3() and inverse()

use crate::Aabb;
use glam::{Mat4, Vec3, Vec3A, Vec4};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform a vector in 3D space (applies rotation and scale, but NOT translation).
    /// Vectors have an implicit w=0 component.
    fn transform_vector3(&self, vector: Vec3) -> Vec3;

    /// Transform a normal with the inverse-transpose, renormalized.
    fn transform_normal(&self, normal: Vec3A) -> Vec3A;

    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn transform_vector3(&self, vector: Vec3) -> Vec3 {
        // Transform as direction (w=0) - translation should not affect vectors
        let v4 = Vec4::new(vector.x, vector.y, vector.z, 0.0);
        let transformed = *self * v4;
        Vec3::new(transformed.x, transformed.y, transformed.z)
    }

    fn transform_normal(&self, normal: Vec3A) -> Vec3A {
        let inv_t = self.inverse().transpose();
        inv_t.transform_vector3a(normal).normalize()
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        // Transform all 8 corners and compute new AABB (no heap allocation)
        let min_p = aabb.min;
        let max_p = aabb.max;

        // Transform first corner to initialize min/max
        let first = self.transform_point3a(min_p);
        let mut result = Aabb {
            min: first,
            max: first,
        };

        // Transform remaining 7 corners, updating min/max inline
        for corner in [
            Vec3A::new(max_p.x, min_p.y, min_p.z),
            Vec3A::new(min_p.x, max_p.y, min_p.z),
            Vec3A::new(max_p.x, max_p.y, min_p.z),
            Vec3A::new(min_p.x, min_p.y, max_p.z),
            Vec3A::new(max_p.x, min_p.y, max_p.z),
            Vec3A::new(min_p.x, max_p.y, max_p.z),
            Vec3A::new(max_p.x, max_p.y, max_p.z),
        ] {
            result.encapsulate(self.transform_point3a(corner));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    #[test]
    fn test_transform_vector3_no_translation() {
        let mat = Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let vector = Vec3::new(1.0, 0.0, 0.0);
        let transformed = mat.transform_vector3(vector);

        // Translation should NOT affect vectors (w=0)
        assert_eq!(transformed, vector);
    }

    #[test]
    fn test_transform_vector3_rotation() {
        use std::f32::consts::PI;

        // 90 degree rotation around Z axis
        let mat = Mat4::from_rotation_z(PI / 2.0);
        let vector = Vec3::new(1.0, 0.0, 0.0);
        let transformed = mat.transform_vector3(vector);

        // X vector should rotate to Y vector
        assert!((transformed.x - 0.0).abs() < 0.001);
        assert!((transformed.y - 1.0).abs() < 0.001);
        assert!((transformed.z - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_transform_normal_nonuniform_scale() {
        // Normals do not scale like vectors
        let mat = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = mat.transform_normal(Vec3A::new(1.0, 1.0, 0.0).normalize());

        // Stretching along X tilts the normal away from X
        assert!(n.x < n.y);
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let aabb = Aabb::from_points(Vec3A::ZERO, Vec3A::ONE);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min - Vec3A::splat(5.0)).length() < 0.001);
        assert!((transformed.max - Vec3A::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation_contains_original_corners() {
        use std::f32::consts::PI;

        let mat = Mat4::from_rotation_y(PI / 4.0);
        let aabb = Aabb::from_points(Vec3A::splat(-1.0), Vec3A::splat(1.0));
        let transformed = mat.transform_aabb(&aabb);

        // Rotated cube needs a wider box along X/Z
        assert!(transformed.max.x > 1.0 + 1e-3);
        assert!(transformed.min.z < -1.0 - 1e-3);
    }
}
