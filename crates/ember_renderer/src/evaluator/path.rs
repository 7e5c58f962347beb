//! Path-tracing evaluator.
//!
//! Iterative bounce loop with next-event estimation against the power
//! distribution, power-heuristic MIS between light and BSDF sampling,
//! throughput energy cutoff, and Russian roulette.

use bumpalo::Bump;
use ember_math::{Ray, Vec3A, Vec4, FORWARD_SHIFT};

use super::Evaluator;
use crate::bsdf::{Bsdf, FunctionType};
use crate::bvh::TraceQuery;
use crate::interaction::Interaction;
use crate::prepare::PreparedScene;
use crate::rng::Sampler;
use crate::sampling::power_heuristic;
use crate::token::{Token, TokenKind};

/// The main light-transport evaluator.
#[derive(Debug, Clone)]
pub struct PathEvaluator {
    /// Maximum number of surface bounces
    pub bounce_limit: u32,

    /// Paths whose throughput drops below this per channel end
    pub energy_epsilon: Vec3A,

    /// First bounce at which Russian roulette may terminate the path
    pub roulette_start: u32,
}

impl Default for PathEvaluator {
    fn default() -> Self {
        Self {
            bounce_limit: 8,
            energy_epsilon: Vec3A::splat(1e-4),
            roulette_start: 3,
        }
    }
}

/// Spheres are legitimately re-hit from inside after a refraction, so
/// only planar primitives use the ignore-token fast path.
fn plane_only(token: Token) -> Token {
    if token.kind() == TokenKind::Triangle {
        token
    } else {
        Token::INVALID
    }
}

impl PathEvaluator {
    /// Direct lighting at a surface point via one power-weighted light
    /// sample, shadow-tested and MIS-weighted against BSDF sampling.
    fn next_event(
        &self,
        scene: &PreparedScene,
        touch: &Interaction,
        bsdf: &Bsdf,
        sampler: &mut Sampler,
        query: &mut TraceQuery,
    ) -> Vec3A {
        let picked = scene.sample_light(touch.point, sampler.next_1d(), sampler.next_2d());
        let Some((light, _, pick_pdf, is_delta)) = picked else {
            return Vec3A::ZERO;
        };
        if light.pdf <= 0.0 || pick_pdf <= 0.0 || light.radiance == Vec3A::ZERO {
            return Vec3A::ZERO;
        }

        let value = bsdf.evaluate(touch.outgoing, light.incident, FunctionType::ALL);
        if value == Vec3A::ZERO {
            return Vec3A::ZERO;
        }
        let cos_incident = light.incident.dot(touch.shading_normal).abs();
        if cos_incident == 0.0 {
            return Vec3A::ZERO;
        }

        // Shadow test up to just short of the light surface
        let shadow = Ray::shifted(touch.point, light.incident);
        let travel = if light.travel.is_finite() {
            light.travel - 2.0 * FORWARD_SHIFT
        } else {
            f32::INFINITY
        };
        query.reset_bounded(shadow, travel, plane_only(touch.token));
        if scene.occlude(query) {
            return Vec3A::ZERO;
        }

        // Combine with the BSDF strategy that could find the same
        // direction; delta lights have no competing strategy
        let light_pdf = light.pdf * pick_pdf;
        let weight = if is_delta {
            1.0
        } else {
            let bsdf_pdf = bsdf.pdf(touch.outgoing, light.incident, FunctionType::ALL);
            power_heuristic(1.0, light_pdf, 1.0, bsdf_pdf)
        };

        light.radiance * value * (cos_incident * weight / light_pdf)
    }

    /// MIS weight for radiance found by the BSDF strategy, against the
    /// light-sampling strategy that could have produced the same
    /// direction. Full credit after a specular bounce, where light
    /// sampling has no matching strategy.
    fn bsdf_side_weight(
        scene: &PreparedScene,
        light_index: Option<usize>,
        origin: Vec3A,
        direction: Vec3A,
        specular_bounce: bool,
        bsdf_pdf: f32,
    ) -> f32 {
        if specular_bounce {
            return 1.0;
        }
        let Some(index) = light_index else {
            return 1.0;
        };
        let light_pdf = scene.light_select_pdf(index) * scene.light_pdf(index, origin, direction);
        power_heuristic(1.0, bsdf_pdf, 1.0, light_pdf)
    }
}

impl Evaluator for PathEvaluator {
    fn evaluate(
        &self,
        scene: &PreparedScene,
        ray: Ray,
        sampler: &mut Sampler,
        arena: &Bump,
        query: &mut TraceQuery,
    ) -> Vec4 {
        let mut radiance = Vec3A::ZERO;
        let mut energy = Vec3A::ONE;
        let mut ray = ray;
        let mut ignore = Token::INVALID;

        // State of the previous bounce, for the BSDF-side MIS weight.
        // Bounce 0 counts as specular so directly visible emitters show.
        let mut specular_bounce = true;
        let mut prev_pdf = 0.0;
        let mut prev_point = Vec3A::ZERO;

        for bounce in 0..self.bounce_limit {
            query.reset(ray, ignore);
            scene.trace(query);

            if !query.hit() {
                if let Some(environment) = scene.environment() {
                    let weight = Self::bsdf_side_weight(
                        scene,
                        scene.ambient_index(),
                        prev_point,
                        ray.direction(),
                        specular_bounce,
                        prev_pdf,
                    );
                    radiance += energy * environment.evaluate(ray.direction()) * weight;
                }
                break;
            }

            let touch = scene.interact(query);

            // Emission is one-sided; the hit must see the front face
            if touch.material.is_emissive() && touch.geometric_normal.dot(touch.outgoing) > 0.0 {
                let weight = Self::bsdf_side_weight(
                    scene,
                    scene.light_index_of(touch.token),
                    prev_point,
                    ray.direction(),
                    specular_bounce,
                    prev_pdf,
                );
                radiance += energy * touch.material.emission() * weight;
            }

            let bsdf = touch.material.scatter(&touch, arena);

            radiance += energy * self.next_event(scene, &touch, &bsdf, sampler, query);

            // Continue the path with a BSDF sample
            let Some(sample) = bsdf.sample(touch.outgoing, sampler.next_2d(), FunctionType::ALL)
            else {
                break;
            };
            if sample.pdf <= 0.0 || sample.value == Vec3A::ZERO {
                break;
            }

            let cos_incident = sample.incident.dot(touch.shading_normal).abs();
            energy *= sample.value * (cos_incident / sample.pdf);
            specular_bounce = sample.function_type.is_specular();
            prev_pdf = sample.pdf;
            prev_point = touch.point;

            if energy.cmple(self.energy_epsilon).all() {
                break;
            }

            // Unbiased probabilistic termination once paths are deep
            if bounce + 1 >= self.roulette_start {
                let survive = energy.max_element().min(1.0);
                if sampler.next_1d().0 >= survive {
                    break;
                }
                energy /= survive;
            }

            ignore = plane_only(touch.token);
            ray = Ray::shifted(touch.point, sample.incident);
        }

        radiance.extend(1.0)
    }
}
