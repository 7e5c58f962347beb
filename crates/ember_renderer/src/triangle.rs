//! Prepared triangle primitive.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use ember_core::RawTriangle;
use ember_math::{Aabb, Ray, Vec2, Vec3A};

use crate::rng::Sample2;
use crate::sampling::uniform_sample_triangle;

/// A triangle pressed for traversal: base vertex plus two edges, with
/// the interpolation attributes the shading path needs.
#[derive(Clone, Debug)]
pub struct PreparedTriangle {
    v0: Vec3A,
    e1: Vec3A,
    e2: Vec3A,

    /// Unit geometric normal (normalize(e1 x e2))
    normal: Vec3A,

    /// Per-vertex texture coordinates
    texcoords: [Vec2; 3],

    /// Per-vertex shading normals (None = flat shading)
    shading_normals: Option<[Vec3A; 3]>,

    /// Pressed material index
    material: u32,
}

impl PreparedTriangle {
    /// Press a raw triangle. Returns None for degenerate input
    /// (zero area or non-finite vertices), which must never be traced.
    pub fn new(raw: &RawTriangle) -> Option<Self> {
        let [v0, v1, v2] = raw.positions;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let cross = e1.cross(e2);
        let len = cross.length();

        if !len.is_finite() || len <= 0.0 {
            return None;
        }

        Some(Self {
            v0,
            e1,
            e2,
            normal: cross / len,
            texcoords: raw.texcoords,
            shading_normals: raw.normals,
            material: raw.material,
        })
    }

    /// Convenience constructor from three vertices with default attributes.
    pub fn from_vertices(v0: Vec3A, v1: Vec3A, v2: Vec3A, material: u32) -> Option<Self> {
        Self::new(&RawTriangle {
            positions: [v0, v1, v2],
            texcoords: [Vec2::ZERO; 3],
            normals: None,
            material,
        })
    }

    /// Vertex i of the triangle.
    pub fn vertex(&self, i: usize) -> Vec3A {
        match i {
            0 => self.v0,
            1 => self.v0 + self.e1,
            _ => self.v0 + self.e2,
        }
    }

    /// Surface area: half the edge cross product length.
    pub fn area(&self) -> f32 {
        self.e1.cross(self.e2).length() * 0.5
    }

    /// World-space bounding box.
    pub fn aabb(&self) -> Aabb {
        let mut aabb = Aabb::from_points(self.v0, self.v0 + self.e1);
        aabb.encapsulate(self.v0 + self.e2);
        aabb
    }

    /// Unit geometric normal.
    #[inline]
    pub fn geometric_normal(&self) -> Vec3A {
        self.normal
    }

    /// Pressed material index.
    #[inline]
    pub fn material(&self) -> u32 {
        self.material
    }

    /// Möller-Trumbore intersection. Returns (t, barycentric (u, v)) of
    /// the nearest positive hit, or None.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, Vec2)> {
        let h = ray.direction().cross(self.e2);
        let det = self.e1.dot(h);

        // Ray parallel to the triangle plane
        if det.abs() < 1e-9 {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = ray.origin() - self.v0;
        let u = inv_det * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.e1);
        let v = inv_det * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * self.e2.dot(q);
        if t <= 0.0 || !t.is_finite() {
            return None;
        }

        Some((t, Vec2::new(u, v)))
    }

    /// Interpolated texcoord at barycentric (u, v).
    pub fn texcoord(&self, uv: Vec2) -> Vec2 {
        let [t0, t1, t2] = self.texcoords;
        t0 * (1.0 - uv.x - uv.y) + t1 * uv.x + t2 * uv.y
    }

    /// Interpolated shading normal at barycentric (u, v); falls back to
    /// the geometric normal for flat-shaded triangles.
    pub fn shading_normal(&self, uv: Vec2) -> Vec3A {
        match &self.shading_normals {
            Some([n0, n1, n2]) => {
                (*n0 * (1.0 - uv.x - uv.y) + *n1 * uv.x + *n2 * uv.y).normalize()
            }
            None => self.normal,
        }
    }

    /// Uniformly sample a point on the triangle.
    /// Returns (point, geometric normal, area pdf).
    pub fn sample_point(&self, u: Sample2) -> (Vec3A, Vec3A, f32) {
        let b = uniform_sample_triangle(u);
        let point = self.v0 + self.e1 * b.x + self.e2 * b.y;
        (point, self.normal, 1.0 / self.area())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> PreparedTriangle {
        PreparedTriangle::from_vertices(
            Vec3A::new(-1.0, -1.0, -1.0),
            Vec3A::new(1.0, -1.0, -1.0),
            Vec3A::new(0.0, 1.0, -1.0),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_triangle_hit() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3A::ZERO, -Vec3A::Z);

        let (t, uv) = tri.intersect(&ray).expect("center ray hits");
        assert!((t - 1.0).abs() < 1e-4);
        assert!(uv.x >= 0.0 && uv.y >= 0.0 && uv.x + uv.y <= 1.0);
    }

    #[test]
    fn test_triangle_miss() {
        let tri = unit_triangle();

        // Pointing away
        assert!(tri.intersect(&Ray::new(Vec3A::ZERO, Vec3A::Z)).is_none());

        // Outside the triangle edge
        let ray = Ray::new(Vec3A::new(5.0, 0.0, 0.0), -Vec3A::Z);
        assert!(tri.intersect(&ray).is_none());
    }

    #[test]
    fn test_degenerate_triangle_rejected() {
        // Zero area: all vertices collinear
        let tri = PreparedTriangle::from_vertices(
            Vec3A::ZERO,
            Vec3A::X,
            Vec3A::new(2.0, 0.0, 0.0),
            0,
        );
        assert!(tri.is_none());

        let tri = PreparedTriangle::from_vertices(
            Vec3A::splat(f32::NAN),
            Vec3A::X,
            Vec3A::Y,
            0,
        );
        assert!(tri.is_none());
    }

    #[test]
    fn test_barycentric_recovery() {
        // Shoot a ray at a known barycentric point; recovered (u,v) must match
        let tri = unit_triangle();
        let (u, v) = (0.25, 0.35);
        let target = tri.vertex(0) * (1.0 - u - v) + tri.vertex(1) * u + tri.vertex(2) * v;
        let n = tri.geometric_normal();

        let origin = target + n * 2.0;
        let ray = Ray::new(origin, -n);

        let (t, uv) = tri.intersect(&ray).expect("interior point hit");
        assert!((t - 2.0).abs() < 1e-4);
        assert!((uv.x - u).abs() < 1e-5);
        assert!((uv.y - v).abs() < 1e-5);
    }

    #[test]
    fn test_triangle_area() {
        let tri = PreparedTriangle::from_vertices(Vec3A::ZERO, Vec3A::X, Vec3A::Y, 0).unwrap();
        assert!((tri.area() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_point_on_surface() {
        let tri = unit_triangle();
        let (point, normal, pdf) = tri.sample_point(Sample2::new(0.4, 0.7));

        // Sampled point lies in the triangle plane
        assert!((point - tri.vertex(0)).dot(normal).abs() < 1e-5);
        assert!((pdf - 1.0 / tri.area()).abs() < 1e-6);
    }

    #[test]
    fn test_texcoord_interpolation() {
        let raw = RawTriangle {
            positions: [Vec3A::ZERO, Vec3A::X, Vec3A::Y],
            texcoords: [Vec2::ZERO, Vec2::X, Vec2::Y],
            normals: None,
            material: 0,
        };
        let tri = PreparedTriangle::new(&raw).unwrap();

        let uv = tri.texcoord(Vec2::new(0.5, 0.25));
        assert!((uv - Vec2::new(0.5, 0.25)).length() < 1e-6);
    }
}
