//! Glossy microfacet reflection and transmission.
//!
//! Trowbridge-Reitz (GGX) normal distribution with the Smith height
//! uncorrelated shadowing-masking term. Half vectors are sampled from
//! the distribution itself.

use std::f32::consts::PI;

use ember_math::{safe_sqrt, sqr, Vec3A};

use super::{abs_cos_theta, cos_theta, same_hemisphere, Bxdf, BxdfSample, FresnelDielectric,
            FunctionType};
use crate::rng::Sample2;

/// Trowbridge-Reitz (GGX) microfacet distribution, isotropic.
#[derive(Debug, Clone, Copy)]
pub struct TrowbridgeReitz {
    alpha: f32,
}

impl TrowbridgeReitz {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.max(1e-3),
        }
    }

    /// Perceptual roughness in [0, 1] to distribution width.
    pub fn from_roughness(roughness: f32) -> Self {
        Self::new(roughness * roughness)
    }

    /// Differential area of microfacets with half vector `wh`.
    pub fn d(&self, wh: Vec3A) -> f32 {
        let cos2 = sqr(cos_theta(wh));
        let a2 = sqr(self.alpha);
        let denom = cos2 * (a2 - 1.0) + 1.0;
        a2 / (PI * sqr(denom))
    }

    /// Smith lambda for one direction.
    fn lambda(&self, w: Vec3A) -> f32 {
        let cos2 = sqr(cos_theta(w));
        if cos2 >= 1.0 {
            return 0.0;
        }
        let tan2 = (1.0 - cos2) / cos2;
        (safe_sqrt(1.0 + sqr(self.alpha) * tan2) - 1.0) * 0.5
    }

    /// Masking term for one direction.
    pub fn g1(&self, w: Vec3A) -> f32 {
        1.0 / (1.0 + self.lambda(w))
    }

    /// Shadowing-masking term for a direction pair.
    pub fn g(&self, wo: Vec3A, wi: Vec3A) -> f32 {
        1.0 / (1.0 + self.lambda(wo) + self.lambda(wi))
    }

    /// Sample a half vector in the +Z hemisphere.
    pub fn sample_wh(&self, u: Sample2, outgoing: Vec3A) -> Vec3A {
        let tan2 = sqr(self.alpha) * u.x / (1.0 - u.x).max(1e-9);
        let cos = 1.0 / safe_sqrt(1.0 + tan2);
        let sin = safe_sqrt(1.0 - sqr(cos));
        let phi = 2.0 * PI * u.y;

        let wh = Vec3A::new(sin * phi.cos(), sin * phi.sin(), cos);
        if same_hemisphere(wh, outgoing) {
            wh
        } else {
            -wh
        }
    }

    /// Density of [`Self::sample_wh`] over half vectors.
    pub fn pdf_wh(&self, wh: Vec3A) -> f32 {
        self.d(wh) * abs_cos_theta(wh)
    }
}

/// Glossy reflection off a microfacet surface.
#[derive(Debug, Clone, Copy)]
pub struct MicrofacetReflection {
    albedo: Vec3A,
    distribution: TrowbridgeReitz,
    fresnel: FresnelDielectric,
}

impl MicrofacetReflection {
    pub fn new(albedo: Vec3A, distribution: TrowbridgeReitz, fresnel: FresnelDielectric) -> Self {
        Self {
            albedo,
            distribution,
            fresnel,
        }
    }
}

impl Bxdf for MicrofacetReflection {
    fn function_type(&self) -> FunctionType {
        FunctionType::REFLECTIVE | FunctionType::GLOSSY
    }

    fn evaluate(&self, outgoing: Vec3A, incident: Vec3A) -> Vec3A {
        if !same_hemisphere(outgoing, incident) {
            return Vec3A::ZERO;
        }
        let cos_o = abs_cos_theta(outgoing);
        let cos_i = abs_cos_theta(incident);
        let mut wh = outgoing + incident;
        if cos_o == 0.0 || cos_i == 0.0 || wh == Vec3A::ZERO {
            return Vec3A::ZERO;
        }
        wh = wh.normalize();

        // Orient toward the interface's outside for the Fresnel angle
        let wh_up = if wh.z < 0.0 { -wh } else { wh };
        let fresnel = self.fresnel.evaluate(outgoing.dot(wh_up));

        self.albedo
            * (self.distribution.d(wh) * self.distribution.g(outgoing, incident)
                * fresnel.reflectance
                / (4.0 * cos_o * cos_i))
    }

    fn pdf(&self, outgoing: Vec3A, incident: Vec3A) -> f32 {
        if !same_hemisphere(outgoing, incident) {
            return 0.0;
        }
        let wh = (outgoing + incident).normalize();
        let dot_o = outgoing.dot(wh);
        if dot_o <= 0.0 {
            return 0.0;
        }
        self.distribution.pdf_wh(wh) / (4.0 * dot_o)
    }

    fn sample(&self, u: Sample2, outgoing: Vec3A) -> Option<BxdfSample> {
        if outgoing.z == 0.0 {
            return None;
        }
        let wh = self.distribution.sample_wh(u, outgoing);
        let dot_o = outgoing.dot(wh);
        if dot_o <= 0.0 {
            return None;
        }

        // Mirror the outgoing direction about the half vector
        let incident = -outgoing + 2.0 * dot_o * wh;
        if !same_hemisphere(outgoing, incident) {
            return None;
        }

        let pdf = self.distribution.pdf_wh(wh) / (4.0 * dot_o);
        if pdf <= 0.0 {
            return None;
        }

        Some(BxdfSample {
            value: self.evaluate(outgoing, incident),
            incident,
            pdf,
            function_type: self.function_type(),
        })
    }
}

/// Glossy transmission through a rough dielectric interface.
#[derive(Debug, Clone, Copy)]
pub struct MicrofacetTransmission {
    albedo: Vec3A,
    distribution: TrowbridgeReitz,

    /// Index of refraction above the surface (+Z side)
    eta_above: f32,

    /// Index of refraction below the surface
    eta_below: f32,
}

impl MicrofacetTransmission {
    pub fn new(
        albedo: Vec3A,
        distribution: TrowbridgeReitz,
        eta_above: f32,
        eta_below: f32,
    ) -> Self {
        Self {
            albedo,
            distribution,
            eta_above,
            eta_below,
        }
    }

    /// Relative index for a given outgoing side.
    fn eta_for(&self, outgoing: Vec3A) -> f32 {
        if cos_theta(outgoing) > 0.0 {
            self.eta_below / self.eta_above
        } else {
            self.eta_above / self.eta_below
        }
    }

    /// Refraction half vector, oriented to +Z.
    fn half_vector(&self, outgoing: Vec3A, incident: Vec3A) -> Vec3A {
        let eta = self.eta_for(outgoing);
        let mut wh = (outgoing + incident * eta).normalize();
        if wh.z < 0.0 {
            wh = -wh;
        }
        wh
    }
}

impl Bxdf for MicrofacetTransmission {
    fn function_type(&self) -> FunctionType {
        FunctionType::TRANSMISSIVE | FunctionType::GLOSSY
    }

    fn evaluate(&self, outgoing: Vec3A, incident: Vec3A) -> Vec3A {
        if same_hemisphere(outgoing, incident) {
            return Vec3A::ZERO;
        }
        let cos_o = cos_theta(outgoing);
        let cos_i = cos_theta(incident);
        if cos_o == 0.0 || cos_i == 0.0 {
            return Vec3A::ZERO;
        }

        let eta = self.eta_for(outgoing);
        let wh = self.half_vector(outgoing, incident);
        let dot_o = outgoing.dot(wh);
        let dot_i = incident.dot(wh);

        // Both directions on one side of the microfacet is impossible
        if dot_o * dot_i > 0.0 {
            return Vec3A::ZERO;
        }

        let fresnel = FresnelDielectric::new(self.eta_above, self.eta_below).evaluate(dot_o);
        if fresnel.total_internal {
            return Vec3A::ZERO;
        }

        let denom = sqr(dot_o + eta * dot_i);
        // 1/eta^2 carries the radiance compression back out
        let factor = 1.0 / eta;

        self.albedo
            * ((1.0 - fresnel.reflectance)
                * (self.distribution.d(wh)
                    * self.distribution.g(outgoing, incident)
                    * sqr(eta)
                    * dot_i.abs()
                    * dot_o.abs()
                    * sqr(factor)
                    / (cos_i * cos_o * denom))
                    .abs())
    }

    fn pdf(&self, outgoing: Vec3A, incident: Vec3A) -> f32 {
        if same_hemisphere(outgoing, incident) {
            return 0.0;
        }
        let eta = self.eta_for(outgoing);
        let wh = self.half_vector(outgoing, incident);
        let dot_o = outgoing.dot(wh);
        let dot_i = incident.dot(wh);
        if dot_o * dot_i > 0.0 {
            return 0.0;
        }

        // Jacobian of the half-vector mapping for refraction
        let denom = sqr(dot_o + eta * dot_i);
        if denom == 0.0 {
            return 0.0;
        }
        let dwh_dwi = (sqr(eta) * dot_i / denom).abs();
        self.distribution.pdf_wh(wh) * dwh_dwi
    }

    fn sample(&self, u: Sample2, outgoing: Vec3A) -> Option<BxdfSample> {
        if outgoing.z == 0.0 {
            return None;
        }
        let wh = self.distribution.sample_wh(u, outgoing);
        let dot_o = outgoing.dot(wh);
        if dot_o <= 0.0 {
            return None;
        }

        // Snell refraction about the sampled microfacet normal
        let eta = 1.0 / self.eta_for(outgoing);
        let cos_i = dot_o;
        let sin2_t = sqr(eta) * (1.0 - sqr(cos_i));
        if sin2_t >= 1.0 {
            // Total internal reflection off the microfacet
            return None;
        }
        let cos_t = safe_sqrt(1.0 - sin2_t);
        let incident = (-outgoing * eta + (eta * cos_i - cos_t) * wh).normalize();

        if same_hemisphere(outgoing, incident) {
            return None;
        }

        let pdf = self.pdf(outgoing, incident);
        if pdf <= 0.0 {
            return None;
        }

        Some(BxdfSample {
            value: self.evaluate(outgoing, incident),
            incident,
            pdf,
            function_type: self.function_type(),
        })
    }
}
