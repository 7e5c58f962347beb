//! BSDF shading system.
//!
//! A BSDF is a per-hit sum of BxDF lobes evaluated in a local frame
//! where the shading normal is +Z. Incident and outgoing directions
//! both point away from the surface. Lobes live in the worker's arena
//! and die with the pixel sample.

mod fresnel;
mod lambert;
mod microfacet;
mod specular;

pub use fresnel::{FresnelDielectric, FresnelTerm};
pub use lambert::LambertianReflection;
pub use microfacet::{MicrofacetReflection, MicrofacetTransmission, TrowbridgeReitz};
pub use specular::{SpecularReflection, SpecularTransmission};

use bumpalo::Bump;
use ember_math::{Frame, Vec3A};

use crate::rng::{Pcg32, Sample2};

/// Classification bitmask for BxDF lobes: one transport axis
/// (reflective / transmissive) and one sharpness axis
/// (diffuse / glossy / specular) per lobe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionType(u8);

impl FunctionType {
    pub const REFLECTIVE: FunctionType = FunctionType(1 << 0);
    pub const TRANSMISSIVE: FunctionType = FunctionType(1 << 1);
    pub const DIFFUSE: FunctionType = FunctionType(1 << 2);
    pub const GLOSSY: FunctionType = FunctionType(1 << 3);
    pub const SPECULAR: FunctionType = FunctionType(1 << 4);
    pub const NONE: FunctionType = FunctionType(0);
    pub const ALL: FunctionType = FunctionType(0b1_1111);

    /// Union of two masks.
    #[inline]
    pub const fn with(self, other: FunctionType) -> FunctionType {
        FunctionType(self.0 | other.0)
    }

    /// True when every bit of `other` is present in `self`.
    #[inline]
    pub const fn contains(self, other: FunctionType) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when any bit is shared.
    #[inline]
    pub const fn intersects(self, other: FunctionType) -> bool {
        self.0 & other.0 != 0
    }

    /// True for Dirac lobes.
    #[inline]
    pub const fn is_specular(self) -> bool {
        self.0 & Self::SPECULAR.0 != 0
    }
}

impl std::ops::BitOr for FunctionType {
    type Output = FunctionType;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

/// Result of sampling a lobe.
#[derive(Debug, Clone, Copy)]
pub struct BxdfSample {
    /// BxDF value for the sampled pair of directions
    pub value: Vec3A,

    /// Sampled incident direction, frame-local
    pub incident: Vec3A,

    /// Density of the sample (1 for Dirac lobes)
    pub pdf: f32,

    /// Type of the lobe that produced the sample
    pub function_type: FunctionType,
}

/// One reflectance/transmittance lobe.
///
/// All directions are frame-local with the shading normal on +Z, unit
/// length, pointing away from the surface.
pub trait Bxdf {
    /// Classification of this lobe.
    fn function_type(&self) -> FunctionType;

    /// BxDF value for a pair of directions (no cosine factor).
    fn evaluate(&self, outgoing: Vec3A, incident: Vec3A) -> Vec3A;

    /// Sampling density for a pair of directions.
    fn pdf(&self, outgoing: Vec3A, incident: Vec3A) -> f32;

    /// Draw an incident direction for the given outgoing one.
    /// None means the sample is impossible (e.g. total internal
    /// reflection); the caller treats it as pdf = 0.
    fn sample(&self, u: Sample2, outgoing: Vec3A) -> Option<BxdfSample>;

    /// Monte Carlo estimate of the directional-hemispherical
    /// reflectance for one outgoing direction.
    fn reflectance(&self, outgoing: Vec3A, rng: &mut Pcg32, samples: u32) -> Vec3A {
        let mut sum = Vec3A::ZERO;
        for _ in 0..samples {
            let u = Sample2::new(rng.next_f32(), rng.next_f32());
            if let Some(s) = self.sample(u, outgoing) {
                if s.pdf > 0.0 {
                    sum += s.value * abs_cos_theta(s.incident) / s.pdf;
                }
            }
        }
        sum / samples.max(1) as f32
    }

    /// Monte Carlo estimate of the hemispherical-hemispherical
    /// reflectance.
    fn reflectance_hemisphere(&self, rng: &mut Pcg32, samples: u32) -> Vec3A {
        let mut sum = Vec3A::ZERO;
        for _ in 0..samples {
            let uo = Sample2::new(rng.next_f32(), rng.next_f32());
            let outgoing = crate::sampling::uniform_sample_sphere(uo);
            let outgoing = Vec3A::new(outgoing.x, outgoing.y, outgoing.z.abs());
            let u = Sample2::new(rng.next_f32(), rng.next_f32());
            if let Some(s) = self.sample(u, outgoing) {
                if s.pdf > 0.0 {
                    let pdf_o = 1.0 / (2.0 * std::f32::consts::PI);
                    sum += s.value * abs_cos_theta(s.incident) * abs_cos_theta(outgoing)
                        / (s.pdf * pdf_o);
                }
            }
        }
        sum / (samples.max(1) as f32 * std::f32::consts::PI)
    }
}

// Local-geometry helpers shared by the lobes.

#[inline]
pub(crate) fn cos_theta(v: Vec3A) -> f32 {
    v.z
}

#[inline]
pub(crate) fn abs_cos_theta(v: Vec3A) -> f32 {
    v.z.abs()
}

#[inline]
pub(crate) fn same_hemisphere(a: Vec3A, b: Vec3A) -> bool {
    a.z * b.z > 0.0
}

/// The per-hit lobe container.
pub struct Bsdf<'a> {
    frame: Frame,
    geometric_normal: Vec3A,

    /// Relative index of refraction across the interface
    pub eta: f32,

    lobes: bumpalo::collections::Vec<'a, &'a dyn Bxdf>,
}

impl<'a> Bsdf<'a> {
    /// Start an empty BSDF for a hit. The frame comes from the shading
    /// normal; the geometric normal drives the reflect/transmit split.
    pub fn new(arena: &'a Bump, shading_normal: Vec3A, geometric_normal: Vec3A, eta: f32) -> Self {
        Self {
            frame: Frame::from_normal(shading_normal),
            geometric_normal,
            eta,
            lobes: bumpalo::collections::Vec::new_in(arena),
        }
    }

    /// Add a lobe allocated in the same arena.
    pub fn add(&mut self, lobe: &'a dyn Bxdf) {
        self.lobes.push(lobe);
    }

    /// Number of lobes matching a mask.
    pub fn matching(&self, mask: FunctionType) -> usize {
        self.lobes
            .iter()
            .filter(|l| mask.contains(l.function_type()))
            .count()
    }

    /// Evaluate the summed BxDF value for world-space directions.
    ///
    /// Whether a lobe counts as reflection or transmission is decided
    /// against the geometric normal, which keeps shading-normal
    /// disagreements from leaking light through surfaces.
    pub fn evaluate(&self, outgoing_w: Vec3A, incident_w: Vec3A, mask: FunctionType) -> Vec3A {
        let outgoing = self.frame.to_local(outgoing_w);
        let incident = self.frame.to_local(incident_w);
        if outgoing.z == 0.0 {
            return Vec3A::ZERO;
        }

        let reflect =
            incident_w.dot(self.geometric_normal) * outgoing_w.dot(self.geometric_normal) > 0.0;
        let transport = if reflect {
            FunctionType::REFLECTIVE
        } else {
            FunctionType::TRANSMISSIVE
        };

        let mut sum = Vec3A::ZERO;
        for lobe in self.lobes.iter() {
            let ty = lobe.function_type();
            if mask.contains(ty) && ty.intersects(transport) {
                sum += lobe.evaluate(outgoing, incident);
            }
        }
        sum
    }

    /// Mean sampling density over the matching lobes.
    pub fn pdf(&self, outgoing_w: Vec3A, incident_w: Vec3A, mask: FunctionType) -> f32 {
        let outgoing = self.frame.to_local(outgoing_w);
        let incident = self.frame.to_local(incident_w);

        let mut sum = 0.0;
        let mut count = 0;
        for lobe in self.lobes.iter() {
            if mask.contains(lobe.function_type()) {
                sum += lobe.pdf(outgoing, incident);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// Sample an incident direction.
    ///
    /// Picks one matching lobe with the remapped first sample dimension,
    /// then (for non-specular picks) folds in the value and pdf of the
    /// other matching lobes. The returned pdf is averaged over the
    /// number of matching lobes.
    pub fn sample(&self, outgoing_w: Vec3A, u: Sample2, mask: FunctionType) -> Option<BsdfSample> {
        let count = self.matching(mask);
        if count == 0 {
            return None;
        }

        let pick = ((u.x * count as f32) as usize).min(count - 1);
        let chosen = self
            .lobes
            .iter()
            .filter(|l| mask.contains(l.function_type()))
            .nth(pick)?;

        // Remap u.x to [0,1) within the chosen slot
        let u = Sample2::new(u.x * count as f32 - pick as f32, u.y);

        let outgoing = self.frame.to_local(outgoing_w);
        if outgoing.z == 0.0 {
            return None;
        }

        let sampled = chosen.sample(u, outgoing)?;
        if sampled.pdf == 0.0 {
            return None;
        }

        let incident = sampled.incident;
        let incident_w = self.frame.to_world(incident);
        let mut value = sampled.value;
        let mut pdf = sampled.pdf;

        if !sampled.function_type.is_specular() && count > 1 {
            let reflect = incident_w.dot(self.geometric_normal)
                * outgoing_w.dot(self.geometric_normal)
                > 0.0;
            let transport = if reflect {
                FunctionType::REFLECTIVE
            } else {
                FunctionType::TRANSMISSIVE
            };

            for (i, lobe) in self
                .lobes
                .iter()
                .filter(|l| mask.contains(l.function_type()))
                .enumerate()
            {
                if i == pick {
                    continue;
                }
                pdf += lobe.pdf(outgoing, incident);
                if lobe.function_type().intersects(transport) {
                    value += lobe.evaluate(outgoing, incident);
                }
            }
        }
        pdf /= count as f32;

        Some(BsdfSample {
            value,
            incident: incident_w,
            pdf,
            function_type: sampled.function_type,
        })
    }
}

/// Result of sampling the full BSDF; directions are world-space.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub value: Vec3A,
    pub incident: Vec3A,
    pub pdf: f32,
    pub function_type: FunctionType,
}
