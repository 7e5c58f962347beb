//! Authored surface materials.
//!
//! These are the artist-facing shading parameters. The renderer presses
//! them into its runtime representation during scene preparation; nothing
//! here is touched on the hot path.

use std::sync::Arc;

use ember_math::{Vec2, Vec3A, Vec4};

use crate::texture::Texture;

/// A color input that is either a constant or a texture.
#[derive(Clone, Debug)]
pub enum TextureSource {
    /// Constant value everywhere
    Constant(Vec4),

    /// Sampled from a texture at the hit texcoord
    Texture(Arc<Texture>),
}

impl TextureSource {
    /// Sample the source at a texcoord.
    #[inline]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        match self {
            TextureSource::Constant(value) => *value,
            TextureSource::Texture(texture) => texture.sample_2d(uv),
        }
    }

    /// True when sampling is independent of the texcoord.
    pub fn is_constant(&self) -> bool {
        matches!(self, TextureSource::Constant(_))
    }

    /// Mean value of the source.
    pub fn average(&self) -> Vec4 {
        match self {
            TextureSource::Constant(value) => *value,
            TextureSource::Texture(texture) => texture.average(),
        }
    }
}

impl From<Vec3A> for TextureSource {
    fn from(color: Vec3A) -> Self {
        TextureSource::Constant(color.extend(1.0))
    }
}

/// Authored material parameters for one surface.
#[derive(Clone, Debug)]
pub struct SurfaceMaterial {
    /// Material name (for logs and debugging)
    pub name: String,

    /// Base color
    pub albedo: TextureSource,

    /// Emitted radiance; non-zero makes the surface an area light
    pub emission: Vec3A,

    /// Microfacet roughness: 0 = mirror-smooth, 1 = fully rough
    pub roughness: f32,

    /// Weight of the reflection lobe
    pub reflectance: f32,

    /// Weight of the transmission lobe
    pub transmittance: f32,

    /// Index of refraction of the interior medium
    pub ior: f32,

    /// Tangent-space normal map
    pub normal_map: Option<Arc<Texture>>,

    /// Per-channel scale applied to the sampled tangent-space normal
    pub normal_intensity: Vec3A,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            albedo: TextureSource::Constant(Vec4::new(0.8, 0.8, 0.8, 1.0)),
            emission: Vec3A::ZERO,
            roughness: 1.0,
            reflectance: 0.0,
            transmittance: 0.0,
            ior: 1.5,
            normal_map: None,
            normal_intensity: Vec3A::ONE,
        }
    }
}

impl SurfaceMaterial {
    /// Create a pure diffuse material.
    pub fn diffuse(name: impl Into<String>, albedo: Vec3A) -> Self {
        Self {
            name: name.into(),
            albedo: albedo.into(),
            ..Default::default()
        }
    }

    /// Create a perfect mirror. The huge index of refraction pushes the
    /// Fresnel term to ~1 at every angle.
    pub fn mirror(name: impl Into<String>, albedo: Vec3A) -> Self {
        Self {
            name: name.into(),
            albedo: albedo.into(),
            roughness: 0.0,
            reflectance: 1.0,
            ior: 1e4,
            ..Default::default()
        }
    }

    /// Create a smooth dielectric (glass-like) material.
    pub fn glass(name: impl Into<String>, ior: f32) -> Self {
        Self {
            name: name.into(),
            albedo: Vec3A::ONE.into(),
            roughness: 0.0,
            reflectance: 1.0,
            transmittance: 1.0,
            ior,
            ..Default::default()
        }
    }

    /// Create a glossy (rough specular) material.
    pub fn glossy(name: impl Into<String>, albedo: Vec3A, roughness: f32) -> Self {
        Self {
            name: name.into(),
            albedo: albedo.into(),
            roughness: roughness.clamp(0.0, 1.0),
            reflectance: 1.0,
            ..Default::default()
        }
    }

    /// Create an emitter.
    pub fn emissive(name: impl Into<String>, radiance: Vec3A) -> Self {
        Self {
            name: name.into(),
            albedo: TextureSource::Constant(Vec4::ZERO),
            emission: radiance,
            ..Default::default()
        }
    }

    /// Set the textured albedo.
    pub fn with_albedo_texture(mut self, texture: Arc<Texture>) -> Self {
        self.albedo = TextureSource::Texture(texture);
        self
    }

    /// Set the tangent-space normal map.
    pub fn with_normal_map(mut self, texture: Arc<Texture>, intensity: Vec3A) -> Self {
        self.normal_map = Some(texture);
        self.normal_intensity = intensity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_source_constant() {
        let source = TextureSource::Constant(Vec4::new(0.2, 0.4, 0.6, 1.0));
        assert!(source.is_constant());
        assert_eq!(source.sample(Vec2::new(0.3, 0.9)), source.average());
    }

    #[test]
    fn test_material_presets() {
        let mirror = SurfaceMaterial::mirror("m", Vec3A::ONE);
        assert_eq!(mirror.roughness, 0.0);
        assert_eq!(mirror.transmittance, 0.0);

        let glass = SurfaceMaterial::glass("g", 1.5);
        assert!(glass.transmittance > 0.0);

        let emitter = SurfaceMaterial::emissive("e", Vec3A::splat(5.0));
        assert!(emitter.emission.max_element() > 0.0);
    }
}
