//! Runtime light sources and the power distribution over them.

use std::f32::consts::PI;

use ember_math::{luminance, Vec3A};

use crate::bvh::Geometry;
use crate::environment::Environment;
use crate::rng::Sample2;
use crate::sampling::Distribution1D;
use crate::token::{Token, TokenKind};

/// One sample toward a light.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    /// Radiance arriving along `incident`
    pub radiance: Vec3A,

    /// Unit direction from the shading point toward the light
    pub incident: Vec3A,

    /// Distance to the light (infinite for directional/ambient)
    pub travel: f32,

    /// Solid-angle density of this sample
    pub pdf: f32,
}

/// A light gathered during scene preparation.
#[derive(Debug)]
pub enum Light {
    /// Point emitter
    Point { position: Vec3A, intensity: Vec3A },

    /// Parallel emitter; `direction` points from the light into the scene
    Directional { direction: Vec3A, radiance: Vec3A },

    /// A primitive with an emissive material
    Area { token: Token, radiance: Vec3A },

    /// The environment; evaluated through the scene's [`Environment`]
    Ambient,
}

impl Light {
    /// True for lights a BSDF sample can never hit.
    pub fn is_delta(&self) -> bool {
        matches!(self, Light::Point { .. } | Light::Directional { .. })
    }

    /// Sample the light from a shading point.
    pub fn sample(
        &self,
        geometry: &Geometry,
        environment: Option<&Environment>,
        point: Vec3A,
        u: Sample2,
    ) -> Option<LightSample> {
        match self {
            Light::Point {
                position,
                intensity,
            } => {
                let to_light = *position - point;
                let distance_sq = to_light.length_squared();
                if distance_sq == 0.0 {
                    return None;
                }
                let distance = distance_sq.sqrt();
                Some(LightSample {
                    radiance: *intensity / distance_sq,
                    incident: to_light / distance,
                    travel: distance,
                    pdf: 1.0,
                })
            }
            Light::Directional {
                direction,
                radiance,
            } => Some(LightSample {
                radiance: *radiance,
                incident: -*direction,
                travel: f32::INFINITY,
                pdf: 1.0,
            }),
            Light::Area { token, radiance } => {
                let (surface, normal, pdf_area) = match token.kind() {
                    TokenKind::Triangle => geometry.triangles[token.index()].sample_point(u),
                    TokenKind::Sphere => geometry.spheres[token.index()].sample_point(u),
                    _ => return None,
                };

                let to_light = surface - point;
                let distance_sq = to_light.length_squared();
                if distance_sq == 0.0 {
                    return None;
                }
                let distance = distance_sq.sqrt();
                let incident = to_light / distance;

                // Emission is one-sided along the surface normal
                let cos_light = normal.dot(-incident);
                if cos_light <= 0.0 {
                    return None;
                }

                // Area density to solid-angle density
                let pdf = pdf_area * distance_sq / cos_light;
                Some(LightSample {
                    radiance: *radiance,
                    incident,
                    travel: distance,
                    pdf,
                })
            }
            Light::Ambient => {
                let environment = environment?;
                let (radiance, incident, pdf) = environment.sample(u);
                if pdf == 0.0 {
                    return None;
                }
                Some(LightSample {
                    radiance,
                    incident,
                    travel: f32::INFINITY,
                    pdf,
                })
            }
        }
    }

    /// Solid-angle density of sampling `incident` from `point`.
    /// Zero for delta lights.
    pub fn pdf(
        &self,
        geometry: &Geometry,
        environment: Option<&Environment>,
        point: Vec3A,
        incident: Vec3A,
    ) -> f32 {
        match self {
            Light::Point { .. } | Light::Directional { .. } => 0.0,
            Light::Area { token, .. } => {
                let ray = ember_math::Ray::shifted(point, incident);
                let (hit, area, normal) = match token.kind() {
                    TokenKind::Triangle => {
                        let tri = &geometry.triangles[token.index()];
                        (tri.intersect(&ray), tri.area(), tri.geometric_normal())
                    }
                    TokenKind::Sphere => {
                        let sphere = &geometry.spheres[token.index()];
                        match sphere.intersect(&ray) {
                            Some((t, uv)) => {
                                let n = sphere.normal_at(ray.at(t));
                                (Some((t, uv)), sphere.area(), n)
                            }
                            None => (None, sphere.area(), Vec3A::Z),
                        }
                    }
                    _ => return 0.0,
                };

                match hit {
                    Some((t, _)) => {
                        let cos_light = normal.dot(-incident).abs();
                        if cos_light == 0.0 {
                            return 0.0;
                        }
                        t * t / (cos_light * area)
                    }
                    None => 0.0,
                }
            }
            Light::Ambient => environment.map_or(0.0, |e| e.pdf(incident)),
        }
    }

    /// Total emitted power, used to weight light selection.
    pub fn power(&self, geometry: &Geometry, environment: Option<&Environment>, scene_radius: f32) -> f32 {
        match self {
            Light::Point { intensity, .. } => 4.0 * PI * luminance(*intensity),
            Light::Directional { radiance, .. } => {
                PI * scene_radius * scene_radius * luminance(*radiance)
            }
            Light::Area { token, radiance } => {
                let area = match token.kind() {
                    TokenKind::Triangle => geometry.triangles[token.index()].area(),
                    TokenKind::Sphere => geometry.spheres[token.index()].area(),
                    _ => 0.0,
                };
                area * PI * luminance(*radiance)
            }
            Light::Ambient => {
                let average = environment.map_or(Vec3A::ZERO, |e| e.average());
                PI * scene_radius * scene_radius * luminance(average)
            }
        }
    }
}

/// Discrete distribution over lights, weighted by power.
#[derive(Debug)]
pub struct PowerDistribution {
    distribution: Distribution1D,
}

impl PowerDistribution {
    pub fn new(
        lights: &[Light],
        geometry: &Geometry,
        environment: Option<&Environment>,
        scene_radius: f32,
    ) -> Self {
        let powers: Vec<f32> = lights
            .iter()
            .map(|l| l.power(geometry, environment, scene_radius))
            .collect();
        Self {
            distribution: Distribution1D::new(&powers),
        }
    }

    /// Pick a light index. Returns (index, pmf).
    pub fn sample(&self, u: f32) -> (usize, f32) {
        self.distribution.sample_discrete(u)
    }

    /// Selection probability of a light index.
    pub fn pdf(&self, index: usize) -> f32 {
        self.distribution.discrete_pdf(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphere::PreparedSphere;
    use crate::triangle::PreparedTriangle;

    fn empty_geometry() -> Geometry<'static> {
        Geometry {
            triangles: &[],
            spheres: &[],
        }
    }

    #[test]
    fn test_point_light_inverse_square() {
        let light = Light::Point {
            position: Vec3A::new(0.0, 2.0, 0.0),
            intensity: Vec3A::splat(100.0),
        };
        let geometry = empty_geometry();

        let sample = light
            .sample(&geometry, None, Vec3A::ZERO, Sample2::new(0.5, 0.5))
            .unwrap();
        assert!((sample.travel - 2.0).abs() < 1e-5);
        assert!((sample.radiance.x - 25.0).abs() < 1e-4);
        assert!((sample.incident - Vec3A::Y).length() < 1e-5);
        assert_eq!(sample.pdf, 1.0);
        assert!(light.is_delta());
    }

    #[test]
    fn test_directional_light_constant() {
        let light = Light::Directional {
            direction: -Vec3A::Y,
            radiance: Vec3A::splat(3.0),
        };
        let sample = light
            .sample(&empty_geometry(), None, Vec3A::splat(7.0), Sample2::new(0.1, 0.9))
            .unwrap();

        assert_eq!(sample.travel, f32::INFINITY);
        assert!((sample.incident - Vec3A::Y).length() < 1e-6);
        assert_eq!(sample.radiance, Vec3A::splat(3.0));
    }

    #[test]
    fn test_area_light_backside_rejected() {
        let triangles =
            vec![
                PreparedTriangle::from_vertices(Vec3A::ZERO, Vec3A::X, Vec3A::Y, 0).unwrap(),
            ];
        let geometry = Geometry {
            triangles: &triangles,
            spheres: &[],
        };
        let light = Light::Area {
            token: Token::triangle(0),
            radiance: Vec3A::ONE,
        };

        // The triangle's normal is +Z; a point below sees the back
        let behind = Vec3A::new(0.2, 0.2, -1.0);
        assert!(light
            .sample(&geometry, None, behind, Sample2::new(0.3, 0.4))
            .is_none());

        // A point above gets a valid sample
        let front = Vec3A::new(0.2, 0.2, 1.0);
        let sample = light
            .sample(&geometry, None, front, Sample2::new(0.3, 0.4))
            .unwrap();
        assert!(sample.pdf > 0.0);
        assert!(sample.incident.z < 0.0);
    }

    #[test]
    fn test_area_light_pdf_matches_sample() {
        let spheres = vec![PreparedSphere::new(Vec3A::new(0.0, 0.0, 5.0), 1.0, 0)];
        let geometry = Geometry {
            triangles: &[],
            spheres: &spheres,
        };
        let light = Light::Area {
            token: Token::sphere(0),
            radiance: Vec3A::ONE,
        };

        let point = Vec3A::ZERO;
        let mut rng = crate::rng::Pcg32::new(1, 2);
        let mut checked = 0;
        for _ in 0..200 {
            let u = Sample2::new(rng.next_f32(), rng.next_f32());
            if let Some(sample) = light.sample(&geometry, None, point, u) {
                // Front-facing samples must trace back onto the sphere
                // with a positive density
                let pdf = light.pdf(&geometry, None, point, sample.incident);
                assert!(pdf > 0.0, "sampled direction lost by pdf()");
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_power_distribution_prefers_bright_lights() {
        let lights = vec![
            Light::Point {
                position: Vec3A::ZERO,
                intensity: Vec3A::splat(1.0),
            },
            Light::Point {
                position: Vec3A::ONE,
                intensity: Vec3A::splat(99.0),
            },
        ];
        let geometry = empty_geometry();
        let distribution = PowerDistribution::new(&lights, &geometry, None, 1.0);

        let (index, pmf) = distribution.sample(0.5);
        assert_eq!(index, 1);
        assert!((pmf - 0.99).abs() < 1e-3);
        assert!((distribution.pdf(0) - 0.01).abs() < 1e-3);
    }

    #[test]
    fn test_ambient_power_scales_with_scene_radius() {
        let environment = Environment::prepare(&ember_core::EnvironmentSource::Constant(
            Vec3A::ONE,
        ));
        let light = Light::Ambient;
        let geometry = empty_geometry();

        let small = light.power(&geometry, Some(&environment), 1.0);
        let large = light.power(&geometry, Some(&environment), 10.0);
        assert!((large / small - 100.0).abs() < 1e-3);
        assert!((small - PI).abs() < 1e-4);
    }
}
