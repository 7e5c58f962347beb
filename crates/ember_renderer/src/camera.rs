//! Render camera: ray generation from the scene's camera entity.

use ember_core::CameraSettings;
use ember_math::{Mat4, Ray, Vec3A};

use crate::rng::Sample2;
use crate::sampling::concentric_sample_disk;

/// A pinhole camera with optional thin-lens defocus, pressed from the
/// scene's camera entity. Looks along local -Z with +Y up.
#[derive(Clone, Debug)]
pub struct Camera {
    center: Vec3A,

    // Cached viewport vectors
    pixel00: Vec3A,
    pixel_delta_u: Vec3A,
    pixel_delta_v: Vec3A,
    defocus_u: Vec3A,
    defocus_v: Vec3A,
    lens_radius: f32,
}

impl Camera {
    /// Press the camera from its settings, world transform, and target
    /// resolution.
    pub fn new(settings: &CameraSettings, world: &Mat4, resolution: (u32, u32)) -> Self {
        let center = world.transform_point3a(Vec3A::ZERO);
        let forward = world.transform_vector3a(-Vec3A::Z).normalize();
        let up_hint = world.transform_vector3a(Vec3A::Y).normalize();

        // Camera basis
        let w = -forward;
        let u = up_hint.cross(w).normalize();
        let v = w.cross(u);

        let focus = settings.focus_distance.max(1e-4);
        let theta = settings.fov_y.to_radians();
        let viewport_height = 2.0 * (theta / 2.0).tan() * focus;
        let viewport_width = viewport_height * resolution.0 as f32 / resolution.1 as f32;

        let viewport_u = u * viewport_width;
        let viewport_v = -v * viewport_height;
        let pixel_delta_u = viewport_u / resolution.0 as f32;
        let pixel_delta_v = viewport_v / resolution.1 as f32;

        let upper_left = center - w * focus - viewport_u * 0.5 - viewport_v * 0.5;
        let pixel00 = upper_left + (pixel_delta_u + pixel_delta_v) * 0.5;

        let lens_radius = settings.lens_radius.max(0.0);
        Self {
            center,
            pixel00,
            pixel_delta_u,
            pixel_delta_v,
            defocus_u: u * lens_radius,
            defocus_v: v * lens_radius,
            lens_radius,
        }
    }

    /// Spawn the primary ray for a pixel. `jitter` places the sample
    /// within the pixel footprint, `lens` picks the aperture point.
    pub fn spawn(&self, pixel: (u32, u32), jitter: Sample2, lens: Sample2) -> Ray {
        let target = self.pixel00
            + self.pixel_delta_u * (pixel.0 as f32 + jitter.x - 0.5)
            + self.pixel_delta_v * (pixel.1 as f32 + jitter.y - 0.5);

        let origin = if self.lens_radius > 0.0 {
            let d = concentric_sample_disk(lens);
            self.center + self.defocus_u * d.x + self.defocus_v * d.y
        } else {
            self.center
        };

        Ray::new(origin, (target - origin).normalize())
    }
}
