//! Perfect specular reflection and transmission (Dirac lobes).

use ember_math::{safe_sqrt, Vec3A};

use super::{abs_cos_theta, cos_theta, Bxdf, BxdfSample, FresnelDielectric, FunctionType};
use crate::rng::Sample2;

/// Mirror reflection weighted by the dielectric Fresnel term.
#[derive(Debug, Clone, Copy)]
pub struct SpecularReflection {
    albedo: Vec3A,
    fresnel: FresnelDielectric,
}

impl SpecularReflection {
    pub fn new(albedo: Vec3A, fresnel: FresnelDielectric) -> Self {
        Self { albedo, fresnel }
    }
}

impl Bxdf for SpecularReflection {
    fn function_type(&self) -> FunctionType {
        FunctionType::REFLECTIVE | FunctionType::SPECULAR
    }

    fn evaluate(&self, _outgoing: Vec3A, _incident: Vec3A) -> Vec3A {
        // Dirac: a continuous evaluation never lines up with the delta
        Vec3A::ZERO
    }

    fn pdf(&self, _outgoing: Vec3A, _incident: Vec3A) -> f32 {
        0.0
    }

    fn sample(&self, _u: Sample2, outgoing: Vec3A) -> Option<BxdfSample> {
        // Mirror across the frame normal (+Z)
        let incident = Vec3A::new(-outgoing.x, -outgoing.y, outgoing.z);
        let cos_i = abs_cos_theta(incident);
        if cos_i == 0.0 {
            return None;
        }

        let fresnel = self.fresnel.evaluate(cos_theta(outgoing));
        Some(BxdfSample {
            value: self.albedo * fresnel.reflectance / cos_i,
            incident,
            pdf: 1.0,
            function_type: self.function_type(),
        })
    }
}

/// Snell-law refraction through a dielectric interface. Handles total
/// internal reflection by returning an impossible sample.
#[derive(Debug, Clone, Copy)]
pub struct SpecularTransmission {
    albedo: Vec3A,

    /// Index of refraction above the surface (+Z side)
    eta_above: f32,

    /// Index of refraction below the surface
    eta_below: f32,
}

impl SpecularTransmission {
    pub fn new(albedo: Vec3A, eta_above: f32, eta_below: f32) -> Self {
        Self {
            albedo,
            eta_above,
            eta_below,
        }
    }
}

impl Bxdf for SpecularTransmission {
    fn function_type(&self) -> FunctionType {
        FunctionType::TRANSMISSIVE | FunctionType::SPECULAR
    }

    fn evaluate(&self, _outgoing: Vec3A, _incident: Vec3A) -> Vec3A {
        Vec3A::ZERO
    }

    fn pdf(&self, _outgoing: Vec3A, _incident: Vec3A) -> f32 {
        0.0
    }

    fn sample(&self, _u: Sample2, outgoing: Vec3A) -> Option<BxdfSample> {
        let entering = cos_theta(outgoing) > 0.0;
        let (eta_i, eta_t) = if entering {
            (self.eta_above, self.eta_below)
        } else {
            (self.eta_below, self.eta_above)
        };
        let eta = eta_i / eta_t;

        let cos_i = abs_cos_theta(outgoing);
        let sin2_i = (1.0 - cos_i * cos_i).max(0.0);
        let sin2_t = eta * eta * sin2_i;

        // Total internal reflection: the transmission lobe cannot fire
        if sin2_t >= 1.0 {
            return None;
        }
        let cos_t = safe_sqrt(1.0 - sin2_t);

        // Refract about +-Z
        let z_sign = if entering { 1.0 } else { -1.0 };
        let incident = Vec3A::new(
            -outgoing.x * eta,
            -outgoing.y * eta,
            -z_sign * cos_t,
        );

        let fresnel = FresnelDielectric::new(eta_i, eta_t).evaluate(cos_i);

        // eta^2 compresses radiance across the interface
        let transmitted = (1.0 - fresnel.reflectance) * eta * eta;
        Some(BxdfSample {
            value: self.albedo * transmitted / abs_cos_theta(incident),
            incident,
            pdf: 1.0,
            function_type: self.function_type(),
        })
    }
}
