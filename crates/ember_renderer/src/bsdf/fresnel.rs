//! Dielectric Fresnel reflectance.

use ember_math::safe_sqrt;

/// Result of a Fresnel evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FresnelTerm {
    /// Unpolarized reflectance in [0, 1]
    pub reflectance: f32,

    /// True when the incident angle is past the critical angle
    pub total_internal: bool,
}

/// Exact Fresnel equations for a dielectric interface.
#[derive(Debug, Clone, Copy)]
pub struct FresnelDielectric {
    /// Refractive index on the incident side
    pub eta_incident: f32,

    /// Refractive index on the transmitted side
    pub eta_transmitted: f32,
}

impl FresnelDielectric {
    pub fn new(eta_incident: f32, eta_transmitted: f32) -> Self {
        Self {
            eta_incident,
            eta_transmitted,
        }
    }

    /// Evaluate reflectance for the given cosine of the incident angle.
    ///
    /// A negative cosine means the ray arrives from the transmitted
    /// side; the indices swap accordingly.
    pub fn evaluate(&self, cos_incident: f32) -> FresnelTerm {
        let mut cos_i = cos_incident.clamp(-1.0, 1.0);
        let (eta_i, eta_t) = if cos_i > 0.0 {
            (self.eta_incident, self.eta_transmitted)
        } else {
            cos_i = -cos_i;
            (self.eta_transmitted, self.eta_incident)
        };

        // Snell's law for the transmitted angle
        let sin_i = safe_sqrt(1.0 - cos_i * cos_i);
        let sin_t = eta_i / eta_t * sin_i;

        if sin_t >= 1.0 {
            return FresnelTerm {
                reflectance: 1.0,
                total_internal: true,
            };
        }

        let cos_t = safe_sqrt(1.0 - sin_t * sin_t);
        let parallel = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
        let perpendicular = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);

        FresnelTerm {
            reflectance: 0.5 * (parallel * parallel + perpendicular * perpendicular),
            total_internal: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_incidence_glass() {
        // ((1.5 - 1) / (1.5 + 1))^2 = 0.04
        let fresnel = FresnelDielectric::new(1.0, 1.5);
        let term = fresnel.evaluate(1.0);
        assert!((term.reflectance - 0.04).abs() < 1e-4);
        assert!(!term.total_internal);
    }

    #[test]
    fn test_grazing_incidence_is_mirror() {
        let fresnel = FresnelDielectric::new(1.0, 1.5);
        let term = fresnel.evaluate(0.001);
        assert!(term.reflectance > 0.95);
    }

    #[test]
    fn test_total_internal_reflection() {
        // From inside glass, past the critical angle (~41.8 degrees)
        let fresnel = FresnelDielectric::new(1.0, 1.5);
        let term = fresnel.evaluate(-(50.0f32).to_radians().cos());
        assert!(term.total_internal);
        assert_eq!(term.reflectance, 1.0);

        // Near-normal exit escapes
        let term = fresnel.evaluate(-0.99);
        assert!(!term.total_internal);
    }

    #[test]
    fn test_reflectance_in_unit_range() {
        let fresnel = FresnelDielectric::new(1.0, 1.5);
        for i in 0..100 {
            let cos = -1.0 + 2.0 * i as f32 / 99.0;
            let term = fresnel.evaluate(cos);
            assert!((0.0..=1.0).contains(&term.reflectance));
        }
    }
}
