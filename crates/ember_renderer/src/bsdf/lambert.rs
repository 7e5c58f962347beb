//! Lambertian diffuse reflection.

use std::f32::consts::PI;

use ember_math::Vec3A;

use super::{abs_cos_theta, same_hemisphere, Bxdf, BxdfSample, FunctionType};
use crate::rng::{Pcg32, Sample2};
use crate::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere};

/// Ideal diffuse reflector: constant value albedo / pi over the
/// hemisphere, cosine-weighted sampling.
#[derive(Debug, Clone, Copy)]
pub struct LambertianReflection {
    albedo: Vec3A,
}

impl LambertianReflection {
    pub fn new(albedo: Vec3A) -> Self {
        Self { albedo }
    }
}

impl Bxdf for LambertianReflection {
    fn function_type(&self) -> FunctionType {
        FunctionType::REFLECTIVE | FunctionType::DIFFUSE
    }

    fn evaluate(&self, _outgoing: Vec3A, _incident: Vec3A) -> Vec3A {
        self.albedo * (1.0 / PI)
    }

    fn pdf(&self, outgoing: Vec3A, incident: Vec3A) -> f32 {
        if same_hemisphere(outgoing, incident) {
            cosine_hemisphere_pdf(abs_cos_theta(incident))
        } else {
            0.0
        }
    }

    fn sample(&self, u: Sample2, outgoing: Vec3A) -> Option<BxdfSample> {
        let mut incident = cosine_sample_hemisphere(u);
        // Keep the sample in the outgoing hemisphere
        if outgoing.z < 0.0 {
            incident.z = -incident.z;
        }

        let pdf = cosine_hemisphere_pdf(abs_cos_theta(incident));
        if pdf == 0.0 {
            return None;
        }

        Some(BxdfSample {
            value: self.evaluate(outgoing, incident),
            incident,
            pdf,
            function_type: self.function_type(),
        })
    }

    fn reflectance(&self, _outgoing: Vec3A, _rng: &mut Pcg32, _samples: u32) -> Vec3A {
        self.albedo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_lambert_symmetry() {
        let lobe = LambertianReflection::new(Vec3A::splat(0.5));
        let a = Vec3A::new(0.3, 0.2, 0.9).normalize();
        let b = Vec3A::new(-0.5, 0.1, 0.85).normalize();
        assert_eq!(lobe.evaluate(a, b), lobe.evaluate(b, a));
    }

    #[test]
    fn test_lambert_pdf_integrates_to_one() {
        // Monte Carlo integral of the pdf over the hemisphere
        let lobe = LambertianReflection::new(Vec3A::splat(0.5));
        let outgoing = Vec3A::new(0.0, 0.3, 0.95).normalize();
        let mut rng = Pcg32::seed_from_u64(2);

        let n = 100_000;
        let mut sum = 0.0f64;
        for _ in 0..n {
            // Uniform hemisphere as the integration measure
            let d = crate::sampling::uniform_sample_sphere(Sample2::new(
                rng.next_f32(),
                rng.next_f32(),
            ));
            let d = Vec3A::new(d.x, d.y, d.z.abs());
            let pdf_uniform = 1.0 / (2.0 * PI);
            sum += (lobe.pdf(outgoing, d) / pdf_uniform) as f64;
        }
        let integral = sum / n as f64;
        assert!((integral - 1.0).abs() < 0.01, "integral = {integral}");
    }

    #[test]
    fn test_lambert_sample_pdf_consistency() {
        let lobe = LambertianReflection::new(Vec3A::splat(0.5));
        let outgoing = Vec3A::new(0.4, -0.1, 0.9).normalize();
        let mut rng = Pcg32::seed_from_u64(3);

        for _ in 0..1000 {
            let u = Sample2::new(rng.next_f32(), rng.next_f32());
            let s = lobe.sample(u, outgoing).expect("cosine sample");
            assert!((s.pdf - lobe.pdf(outgoing, s.incident)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_lambert_sample_stays_in_hemisphere() {
        let lobe = LambertianReflection::new(Vec3A::ONE);
        let below = Vec3A::new(0.2, 0.1, -0.95).normalize();
        let mut rng = Pcg32::seed_from_u64(4);

        for _ in 0..100 {
            let u = Sample2::new(rng.next_f32(), rng.next_f32());
            let s = lobe.sample(u, below).expect("sample");
            assert!(same_hemisphere(below, s.incident));
        }
    }
}
