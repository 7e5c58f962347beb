//! Pressed materials.
//!
//! An authored `SurfaceMaterial` is pressed once per prepare: constant
//! inputs are detected, emission and normal-map flags are cached, and
//! `scatter` turns the parameters into BSDF lobes at each hit.

use std::sync::Arc;

use bumpalo::Bump;
use ember_core::SurfaceMaterial;
use ember_math::{Frame, Vec2, Vec3A, Vec4};

use crate::bsdf::{
    Bsdf, FresnelDielectric, LambertianReflection, MicrofacetReflection, MicrofacetTransmission,
    SpecularReflection, SpecularTransmission, TrowbridgeReitz,
};
use crate::interaction::Interaction;

/// Below this roughness a lobe degenerates to the Dirac version.
const SMOOTH_ROUGHNESS: f32 = 1e-3;

/// A material pressed for rendering.
#[derive(Debug)]
pub struct PressedMaterial {
    source: Arc<SurfaceMaterial>,

    // Invariants cached by press()
    emission: Vec3A,
    emissive: bool,
    constant_albedo: Option<Vec4>,
    normal_mapped: bool,
}

impl PressedMaterial {
    /// Press an authored material: precompute everything that does not
    /// depend on the hit point.
    pub fn press(source: Arc<SurfaceMaterial>) -> Self {
        let emission = source.emission;
        let emissive = emission.max_element() > 0.0;
        let constant_albedo = source
            .albedo
            .is_constant()
            .then(|| source.albedo.average());
        let normal_mapped =
            source.normal_map.is_some() && source.normal_intensity.max_element() > 0.0;

        Self {
            source,
            emission,
            emissive,
            constant_albedo,
            normal_mapped,
        }
    }

    /// True when the surface emits light.
    #[inline]
    pub fn is_emissive(&self) -> bool {
        self.emissive
    }

    /// Emitted radiance.
    #[inline]
    pub fn emission(&self) -> Vec3A {
        self.emission
    }

    /// True for a smooth, fully transmissive, non-emissive surface that
    /// the albedo pass can look straight through.
    pub fn is_pass_through(&self) -> bool {
        !self.emissive
            && self.source.transmittance >= 1.0
            && self.source.roughness <= SMOOTH_ROUGHNESS
    }

    /// Albedo at a texcoord.
    pub fn sample_albedo(&self, texcoord: Vec2) -> Vec4 {
        match self.constant_albedo {
            Some(value) => value,
            None => self.source.albedo.sample(texcoord),
        }
    }

    /// Perturb a shading normal by the tangent-space normal map.
    /// Returns whether the normal changed.
    pub fn apply_normal_mapping(&self, texcoord: Vec2, normal: &mut Vec3A) -> bool {
        if !self.normal_mapped {
            return false;
        }
        let map = match &self.source.normal_map {
            Some(map) => map,
            None => return false,
        };

        // Decode [0,1] texels to a tangent-space vector and scale it
        let texel = map.sample_2d(texcoord);
        let tangent_normal =
            (Vec3A::new(texel.x, texel.y, texel.z) * 2.0 - Vec3A::ONE) * self.source.normal_intensity;
        if tangent_normal.length_squared() < 1e-12 {
            return false;
        }

        let frame = Frame::from_normal(*normal);
        *normal = frame.to_world(tangent_normal.normalize()).normalize();
        true
    }

    /// Build the BSDF for a hit, allocating lobes from the arena.
    pub fn scatter<'a>(&self, touch: &Interaction, arena: &'a Bump) -> Bsdf<'a> {
        let mut bsdf = Bsdf::new(
            arena,
            touch.shading_normal,
            touch.geometric_normal,
            self.source.ior,
        );

        let albedo_sample = self.sample_albedo(touch.texcoord);
        let albedo = Vec3A::new(albedo_sample.x, albedo_sample.y, albedo_sample.z);

        let reflect = self.source.reflectance.clamp(0.0, 1.0);
        let transmit = self.source.transmittance.clamp(0.0, 1.0);
        let smooth = self.source.roughness <= SMOOTH_ROUGHNESS;
        let fresnel = FresnelDielectric::new(1.0, self.source.ior);

        if reflect > 0.0 {
            let tint = if transmit > 0.0 {
                // A dielectric interface reflects the full spectrum
                Vec3A::splat(reflect)
            } else {
                albedo * reflect
            };
            if smooth {
                bsdf.add(arena.alloc(SpecularReflection::new(tint, fresnel)));
            } else {
                let distribution = TrowbridgeReitz::from_roughness(self.source.roughness);
                bsdf.add(arena.alloc(MicrofacetReflection::new(tint, distribution, fresnel)));
            }
        }

        if transmit > 0.0 {
            let tint = albedo * transmit;
            if smooth {
                bsdf.add(arena.alloc(SpecularTransmission::new(tint, 1.0, self.source.ior)));
            } else {
                let distribution = TrowbridgeReitz::from_roughness(self.source.roughness);
                bsdf.add(arena.alloc(MicrofacetTransmission::new(
                    tint,
                    distribution,
                    1.0,
                    self.source.ior,
                )));
            }
        }

        let diffuse = (1.0 - reflect) * (1.0 - transmit);
        if diffuse > 0.0 {
            bsdf.add(arena.alloc(LambertianReflection::new(albedo * diffuse)));
        }

        bsdf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::FunctionType;
    use crate::token::Token;
    use ember_core::Texture;

    fn touch_at<'a>(material: &'a PressedMaterial) -> Interaction<'a> {
        Interaction {
            point: Vec3A::ZERO,
            geometric_normal: Vec3A::Z,
            shading_normal: Vec3A::Z,
            outgoing: Vec3A::Z,
            texcoord: Vec2::new(0.5, 0.5),
            material,
            token: Token::triangle(0),
        }
    }

    #[test]
    fn test_press_caches_invariants() {
        let pressed = PressedMaterial::press(Arc::new(SurfaceMaterial::emissive(
            "lamp",
            Vec3A::splat(4.0),
        )));
        assert!(pressed.is_emissive());
        assert_eq!(pressed.emission(), Vec3A::splat(4.0));

        let pressed =
            PressedMaterial::press(Arc::new(SurfaceMaterial::diffuse("wall", Vec3A::splat(0.5))));
        assert!(!pressed.is_emissive());
        assert!(pressed.constant_albedo.is_some());
    }

    #[test]
    fn test_diffuse_scatter_has_single_diffuse_lobe() {
        let pressed =
            PressedMaterial::press(Arc::new(SurfaceMaterial::diffuse("wall", Vec3A::splat(0.5))));
        let arena = Bump::new();
        let bsdf = pressed.scatter(&touch_at(&pressed), &arena);

        assert_eq!(bsdf.matching(FunctionType::ALL), 1);
        assert_eq!(
            bsdf.matching(FunctionType::REFLECTIVE | FunctionType::DIFFUSE),
            1
        );
    }

    #[test]
    fn test_glass_scatter_has_reflection_and_transmission() {
        let pressed = PressedMaterial::press(Arc::new(SurfaceMaterial::glass("glass", 1.5)));
        let arena = Bump::new();
        let bsdf = pressed.scatter(&touch_at(&pressed), &arena);

        assert_eq!(bsdf.matching(FunctionType::ALL), 2);
        assert_eq!(
            bsdf.matching(FunctionType::REFLECTIVE | FunctionType::SPECULAR),
            1
        );
        assert_eq!(
            bsdf.matching(FunctionType::TRANSMISSIVE | FunctionType::SPECULAR),
            1
        );
        assert!(pressed.is_pass_through());
    }

    #[test]
    fn test_glossy_scatter_uses_microfacet() {
        let pressed = PressedMaterial::press(Arc::new(SurfaceMaterial::glossy(
            "brushed",
            Vec3A::splat(0.9),
            0.3,
        )));
        let arena = Bump::new();
        let bsdf = pressed.scatter(&touch_at(&pressed), &arena);

        assert_eq!(
            bsdf.matching(FunctionType::REFLECTIVE | FunctionType::GLOSSY),
            1
        );
        assert_eq!(bsdf.matching(FunctionType::SPECULAR), 0);
    }

    #[test]
    fn test_normal_mapping_identity_detected() {
        // A flat normal map must be pressed, not applied per hit
        let pressed = PressedMaterial::press(Arc::new(
            SurfaceMaterial::diffuse("flat", Vec3A::ONE).with_normal_map(
                Arc::new(Texture::solid(Vec4::new(0.5, 0.5, 1.0, 1.0))),
                Vec3A::ZERO,
            ),
        ));

        let mut normal = Vec3A::Z;
        assert!(!pressed.apply_normal_mapping(Vec2::ZERO, &mut normal));
        assert_eq!(normal, Vec3A::Z);
    }

    #[test]
    fn test_normal_mapping_perturbs() {
        let pressed = PressedMaterial::press(Arc::new(
            SurfaceMaterial::diffuse("bumpy", Vec3A::ONE).with_normal_map(
                Arc::new(Texture::solid(Vec4::new(0.8, 0.5, 0.9, 1.0))),
                Vec3A::ONE,
            ),
        ));

        let mut normal = Vec3A::Z;
        assert!(pressed.apply_normal_mapping(Vec2::ZERO, &mut normal));
        assert!((normal.length() - 1.0).abs() < 1e-5);
        assert!(normal.x > 0.0);
        assert!(normal != Vec3A::Z);
    }
}
