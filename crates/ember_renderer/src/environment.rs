//! Directional radiance sources for ambient lighting.
//!
//! Constant and gradient skies sample the sphere uniformly; textured
//! environments build a luminance distribution over the equirectangular
//! map and importance-sample it.

use std::f32::consts::PI;

use ember_core::{EnvironmentSource, Texture};
use ember_math::{luminance, Vec2, Vec3A};

use crate::rng::Sample2;
use crate::sampling::{uniform_sample_sphere, uniform_sphere_pdf, Distribution2D};

/// A prepared directional radiance source.
#[derive(Debug)]
pub enum Environment {
    /// Same radiance everywhere
    Constant { radiance: Vec3A },

    /// Vertical gradient: zenith color straight up, horizon color at
    /// the equator, mirrored below
    Gradient { zenith: Vec3A, horizon: Vec3A },

    /// Equirectangular radiance map with an importance distribution
    Texture {
        texture: std::sync::Arc<Texture>,
        distribution: Distribution2D,
        average: Vec3A,
    },
}

impl Environment {
    /// Press an environment description. For textured environments this
    /// builds the sampling distribution; the sin(theta) factor folds the
    /// sphere metric into the map.
    pub fn prepare(source: &EnvironmentSource) -> Self {
        match source {
            EnvironmentSource::Constant(radiance) => Environment::Constant {
                radiance: *radiance,
            },
            EnvironmentSource::Gradient { zenith, horizon } => Environment::Gradient {
                zenith: *zenith,
                horizon: *horizon,
            },
            EnvironmentSource::Texture(texture) => {
                let (width, height) = texture.size();
                let (width, height) = (width as usize, height as usize);

                let mut weights = Vec::with_capacity(width * height);
                for y in 0..height {
                    let v = (y as f32 + 0.5) / height as f32;
                    let sin_theta = (PI * v).sin();
                    for x in 0..width {
                        let u = (x as f32 + 0.5) / width as f32;
                        let radiance = texture.sample_2d(Vec2::new(u, 1.0 - v));
                        weights.push(
                            luminance(Vec3A::new(radiance.x, radiance.y, radiance.z)) * sin_theta,
                        );
                    }
                }

                let average = texture.average();
                Environment::Texture {
                    texture: texture.clone(),
                    distribution: Distribution2D::new(&weights, width, height),
                    average: Vec3A::new(average.x, average.y, average.z),
                }
            }
        }
    }

    /// Radiance arriving from a direction.
    pub fn evaluate(&self, direction: Vec3A) -> Vec3A {
        match self {
            Environment::Constant { radiance } => *radiance,
            Environment::Gradient { zenith, horizon } => {
                let t = direction.y.abs();
                *horizon * (1.0 - t) + *zenith * t
            }
            Environment::Texture { texture, .. } => {
                let uv = direction_to_equirect(direction);
                let value = texture.sample_2d(uv);
                Vec3A::new(value.x, value.y, value.z)
            }
        }
    }

    /// Sample an incident direction. Returns (radiance, direction,
    /// solid-angle pdf).
    pub fn sample(&self, u: Sample2) -> (Vec3A, Vec3A, f32) {
        match self {
            Environment::Constant { .. } | Environment::Gradient { .. } => {
                let direction = uniform_sample_sphere(u);
                (self.evaluate(direction), direction, uniform_sphere_pdf())
            }
            Environment::Texture { distribution, .. } => {
                let (map_uv, map_pdf) = distribution.sample_continuous(u);
                let direction = equirect_to_direction(map_uv);

                let theta = map_uv.y * PI;
                let sin_theta = theta.sin();
                if map_pdf == 0.0 || sin_theta == 0.0 {
                    return (Vec3A::ZERO, direction, 0.0);
                }

                // Map-area density to solid-angle density
                let pdf = map_pdf / (2.0 * PI * PI * sin_theta);
                (self.evaluate(direction), direction, pdf)
            }
        }
    }

    /// Solid-angle density of [`Self::sample`] for a direction.
    pub fn pdf(&self, direction: Vec3A) -> f32 {
        match self {
            Environment::Constant { .. } | Environment::Gradient { .. } => uniform_sphere_pdf(),
            Environment::Texture { distribution, .. } => {
                let uv = equirect_uv(direction);
                let sin_theta = (uv.y * PI).sin();
                if sin_theta == 0.0 {
                    return 0.0;
                }
                distribution.pdf(uv) / (2.0 * PI * PI * sin_theta)
            }
        }
    }

    /// Mean radiance over all directions.
    pub fn average(&self) -> Vec3A {
        match self {
            Environment::Constant { radiance } => *radiance,
            Environment::Gradient { zenith, horizon } => (*zenith + *horizon) * 0.5,
            Environment::Texture { average, .. } => *average,
        }
    }
}

/// Unit direction to texcoord for sampling an equirectangular texture.
fn direction_to_equirect(direction: Vec3A) -> Vec2 {
    let uv = equirect_uv(direction);
    // Texture V runs bottom-up
    Vec2::new(uv.x, 1.0 - uv.y)
}

/// Unit direction to (phi, theta)-normalized map coordinates.
fn equirect_uv(direction: Vec3A) -> Vec2 {
    let theta = direction.y.clamp(-1.0, 1.0).acos();
    let phi = direction.z.atan2(direction.x) + PI;
    Vec2::new(phi / (2.0 * PI), theta / PI)
}

/// Inverse of [`equirect_uv`].
fn equirect_to_direction(uv: Vec2) -> Vec3A {
    let phi = uv.x * 2.0 * PI - PI;
    let theta = uv.y * PI;
    let sin_theta = theta.sin();
    Vec3A::new(sin_theta * phi.cos(), theta.cos(), sin_theta * phi.sin())
}
