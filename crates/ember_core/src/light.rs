//! Light source descriptions.
//!
//! Positions and directions come from the owning entity's transform at
//! prepare time: a point light sits at the entity origin, a directional
//! light shines along the entity's local -Z. Area lights are not listed
//! here; any shape with an emissive material becomes one.

use std::sync::Arc;

use ember_math::Vec3A;

use crate::texture::Texture;

/// Where ambient radiance comes from.
#[derive(Clone, Debug)]
pub enum EnvironmentSource {
    /// Same radiance in every direction
    Constant(Vec3A),

    /// Vertical gradient between a zenith and a horizon color
    Gradient { zenith: Vec3A, horizon: Vec3A },

    /// Equirectangular radiance map, importance-sampled by the renderer
    Texture(Arc<Texture>),
}

/// A light attached to an entity.
#[derive(Clone, Debug)]
pub enum LightSource {
    /// Point light with the given intensity (radiant intensity per channel)
    Point { intensity: Vec3A },

    /// Directional light with the given radiance
    Directional { radiance: Vec3A },

    /// Ambient illumination arriving from every direction
    Ambient(EnvironmentSource),
}
