//! Orthonormal frame around a normal.

use glam::Vec3A;

/// A right-handed orthonormal basis with the normal on +Z.
///
/// Built with the branchless construction of Duff et al., which stays
/// well conditioned when the normal approaches ±Z.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub tangent: Vec3A,
    pub bitangent: Vec3A,
    pub normal: Vec3A,
}

impl Frame {
    /// Build a frame from a unit normal.
    pub fn from_normal(n: Vec3A) -> Self {
        let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;

        Self {
            tangent: Vec3A::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
            bitangent: Vec3A::new(b, sign + n.y * n.y * a, -n.y),
            normal: n,
        }
    }

    /// Express a world-space vector in frame-local coordinates.
    #[inline]
    pub fn to_local(&self, v: Vec3A) -> Vec3A {
        Vec3A::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
    }

    /// Express a frame-local vector in world coordinates.
    #[inline]
    pub fn to_world(&self, v: Vec3A) -> Vec3A {
        v.x * self.tangent + v.y * self.bitangent + v.z * self.normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_orthonormal(n: Vec3A) {
        let f = Frame::from_normal(n);

        assert!(f.tangent.dot(f.normal).abs() < 1e-5);
        assert!(f.bitangent.dot(f.normal).abs() < 1e-5);
        assert!(f.tangent.dot(f.bitangent).abs() < 1e-5);
        assert!((f.tangent.length() - 1.0).abs() < 1e-5);
        assert!((f.bitangent.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_frame_orthonormal() {
        check_orthonormal(Vec3A::Y);
        check_orthonormal(Vec3A::new(0.577_35, 0.577_35, 0.577_35));
    }

    #[test]
    fn test_frame_near_negative_z() {
        // The naive cross-with-up construction degenerates here
        check_orthonormal(Vec3A::new(1e-5, 0.0, -1.0).normalize());
        check_orthonormal(-Vec3A::Z);
    }

    #[test]
    fn test_frame_roundtrip() {
        let f = Frame::from_normal(Vec3A::new(0.3, -0.5, 0.8).normalize());
        let v = Vec3A::new(0.2, 0.7, -0.4);
        let back = f.to_world(f.to_local(v));
        assert!((back - v).length() < 1e-5);
    }

    #[test]
    fn test_frame_normal_is_local_z() {
        let n = Vec3A::new(0.0, 1.0, 0.0);
        let f = Frame::from_normal(n);
        let local = f.to_local(n);
        assert!((local - Vec3A::Z).length() < 1e-5);
    }
}
