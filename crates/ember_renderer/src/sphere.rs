//! Prepared sphere primitive.

use std::f32::consts::PI;

use ember_math::{Aabb, Ray, Vec2, Vec3A};

use crate::rng::Sample2;
use crate::sampling::uniform_sample_sphere;

/// A sphere pressed for traversal.
#[derive(Clone, Copy, Debug)]
pub struct PreparedSphere {
    center: Vec3A,
    radius: f32,

    /// Pressed material index
    material: u32,
}

impl PreparedSphere {
    pub fn new(center: Vec3A, radius: f32, material: u32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3A {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn material(&self) -> u32 {
        self.material
    }

    /// Surface area.
    pub fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    /// World-space bounding box.
    pub fn aabb(&self) -> Aabb {
        let r = Vec3A::splat(self.radius);
        Aabb {
            min: self.center - r,
            max: self.center + r,
        }
    }

    /// Outward unit normal at a surface point.
    #[inline]
    pub fn normal_at(&self, point: Vec3A) -> Vec3A {
        (point - self.center) / self.radius
    }

    /// Intersect with a ray. Returns (t, polar texcoord) of the nearest
    /// positive hit: texcoord = (phi / 2pi, theta / pi) in [0, 1]^2.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, Vec2)> {
        let oc = self.center - ray.origin();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_d = discriminant.sqrt();

        // Nearest positive root; fall through to the far root from inside
        let mut t = h - sqrt_d;
        if t <= 0.0 {
            t = h + sqrt_d;
            if t <= 0.0 {
                return None;
            }
        }

        let n = self.normal_at(ray.at(t));
        Some((t, Self::polar_texcoord(n)))
    }

    /// Map an outward unit normal to the polar texcoord.
    fn polar_texcoord(n: Vec3A) -> Vec2 {
        let theta = n.y.clamp(-1.0, 1.0).acos();
        let phi = n.z.atan2(n.x) + PI;
        Vec2::new(phi / (2.0 * PI), theta / PI)
    }

    /// Uniformly sample a point on the sphere surface.
    /// Returns (point, outward normal, area pdf).
    pub fn sample_point(&self, u: Sample2) -> (Vec3A, Vec3A, f32) {
        let normal = uniform_sample_sphere(u);
        (
            self.center + normal * self.radius,
            normal,
            1.0 / self.area(),
        )
    }
}
