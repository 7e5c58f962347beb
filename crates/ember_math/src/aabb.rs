//! Axis-aligned bounding box for spatial acceleration structures (BVH).

use glam::Vec3A;

use crate::Ray;

/// Multiplier applied to the far slab distance. Turns rays that graze a
/// box edge from false misses into false hits, which traversal tolerates.
pub const FAR_MULTIPLIER: f32 = 1.000_000_24;

/// An AABB stored as two `Vec3A` corners. Invariant: `max >= min`
/// componentwise for any box that contains geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3A,
    pub max: Vec3A,
}

impl Aabb {
    /// Create an AABB from two corner points (in any order).
    pub fn from_points(a: Vec3A, b: Vec3A) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// An empty AABB (contains nothing; absorbs on encapsulate).
    pub const EMPTY: Aabb = Aabb {
        min: Vec3A::INFINITY,
        max: Vec3A::NEG_INFINITY,
    };

    /// Test a ray against the box with the slab method.
    ///
    /// Returns the nearest non-negative entry distance, or `+inf` on a
    /// miss. The far slab is widened by [`FAR_MULTIPLIER`] so grazing
    /// rays err on the side of a hit.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> f32 {
        let t0 = (self.min - ray.origin()) * ray.recip();
        let t1 = (self.max - ray.origin()) * ray.recip();
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element() * FAR_MULTIPLIER;

        if near <= far && far >= 0.0 {
            near.max(0.0)
        } else {
            f32::INFINITY
        }
    }

    /// Grow the box to contain a point.
    #[inline]
    pub fn encapsulate(&mut self, point: Vec3A) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow the box to contain another box.
    #[inline]
    pub fn encapsulate_box(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// The box that surrounds two other boxes.
    pub fn surrounding(a: &Aabb, b: &Aabb) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Half of the surface area. The SAH cost model only needs relative
    /// areas, so the factor of two is dropped.
    #[inline]
    pub fn half_area(&self) -> f32 {
        let e = (self.max - self.min).max(Vec3A::ZERO);
        e.x * e.y + e.y * e.z + e.z * e.x
    }

    /// Index (0=X, 1=Y, 2=Z) of the axis with the largest extent.
    pub fn major_axis(&self) -> usize {
        let e = self.max - self.min;
        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }

    /// Center point of the box.
    #[inline]
    pub fn centroid(&self) -> Vec3A {
        (self.min + self.max) * 0.5
    }

    /// Componentwise extent of the box.
    #[inline]
    pub fn extent(&self) -> Vec3A {
        self.max - self.min
    }

    /// Radius of the bounding sphere around the centroid.
    pub fn bounding_radius(&self) -> f32 {
        (self.extent() * 0.5).length()
    }

    /// True when every component satisfies `max >= min`.
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3A::new(10.0, 0.0, 5.0), Vec3A::new(0.0, 10.0, -5.0));
        assert_eq!(aabb.min, Vec3A::new(0.0, 0.0, -5.0));
        assert_eq!(aabb.max, Vec3A::new(10.0, 10.0, 5.0));
        assert!(aabb.is_valid());
    }

    #[test]
    fn test_aabb_intersect_hit_and_miss() {
        let aabb = Aabb::from_points(Vec3A::splat(-1.0), Vec3A::splat(1.0));

        // Ray pointing at the box
        let ray = Ray::new(Vec3A::new(0.0, 0.0, -5.0), Vec3A::Z);
        let t = aabb.intersect(&ray);
        assert!((t - 4.0).abs() < 1e-5);

        // Ray pointing away
        let ray = Ray::new(Vec3A::new(0.0, 0.0, -5.0), -Vec3A::Z);
        assert_eq!(aabb.intersect(&ray), f32::INFINITY);

        // Ray missing the box
        let ray = Ray::new(Vec3A::new(10.0, 0.0, -5.0), Vec3A::Z);
        assert_eq!(aabb.intersect(&ray), f32::INFINITY);
    }

    #[test]
    fn test_aabb_intersect_origin_inside() {
        let aabb = Aabb::from_points(Vec3A::splat(-1.0), Vec3A::splat(1.0));
        let ray = Ray::new(Vec3A::ZERO, Vec3A::X);
        // Entry distance is clamped at zero for rays starting inside
        assert_eq!(aabb.intersect(&ray), 0.0);
    }

    #[test]
    fn test_aabb_intersect_monotone_in_containment() {
        // A ⊆ B implies A's entry distance >= B's when both hit
        let a = Aabb::from_points(Vec3A::splat(-0.5), Vec3A::splat(0.5));
        let b = Aabb::from_points(Vec3A::splat(-1.0), Vec3A::splat(1.0));
        let ray = Ray::new(Vec3A::new(0.0, 0.0, -4.0), Vec3A::Z);

        let ta = a.intersect(&ray);
        let tb = b.intersect(&ray);
        assert!(ta.is_finite() && tb.is_finite());
        assert!(ta >= tb);
    }

    #[test]
    fn test_aabb_grazing_ray_never_nan() {
        // Ray running exactly along the box face: entry == exit
        let aabb = Aabb::from_points(Vec3A::splat(-1.0), Vec3A::splat(1.0));
        let ray = Ray::new(Vec3A::new(1.0, 0.0, -5.0), Vec3A::Z);
        let t = aabb.intersect(&ray);
        assert!(!t.is_nan());
        assert!(t.is_finite() || t == f32::INFINITY);
    }

    #[test]
    fn test_aabb_half_area_and_major_axis() {
        let aabb = Aabb::from_points(Vec3A::ZERO, Vec3A::new(4.0, 2.0, 1.0));
        assert!((aabb.half_area() - (8.0 + 2.0 + 4.0)).abs() < 1e-6);
        assert_eq!(aabb.major_axis(), 0);

        let aabb = Aabb::from_points(Vec3A::ZERO, Vec3A::new(1.0, 5.0, 2.0));
        assert_eq!(aabb.major_axis(), 1);
    }

    #[test]
    fn test_aabb_encapsulate() {
        let mut aabb = Aabb::EMPTY;
        aabb.encapsulate(Vec3A::new(1.0, 2.0, 3.0));
        aabb.encapsulate(Vec3A::new(-1.0, 0.0, 5.0));
        assert_eq!(aabb.min, Vec3A::new(-1.0, 0.0, 3.0));
        assert_eq!(aabb.max, Vec3A::new(1.0, 2.0, 5.0));
    }
}
