//! Albedo evaluator: flat base color, no transport.

use bumpalo::Bump;
use ember_math::{Ray, Vec4};

use super::Evaluator;
use crate::bvh::TraceQuery;
use crate::prepare::PreparedScene;
use crate::rng::Sampler;
use crate::token::Token;

/// Returns the albedo of the first non-pass-through hit, or the
/// ambient radiance on a miss. Used for denoiser feature buffers and
/// quick scene checks.
#[derive(Debug, Clone)]
pub struct AlbedoEvaluator {
    /// How many pass-through surfaces (clear glass) to look through
    pub depth_limit: u32,
}

impl Default for AlbedoEvaluator {
    fn default() -> Self {
        Self { depth_limit: 8 }
    }
}

impl Evaluator for AlbedoEvaluator {
    fn evaluate(
        &self,
        scene: &PreparedScene,
        ray: Ray,
        _sampler: &mut Sampler,
        _arena: &Bump,
        query: &mut TraceQuery,
    ) -> Vec4 {
        let mut ray = ray;
        let mut ignore = Token::INVALID;

        for _ in 0..self.depth_limit {
            query.reset(ray, ignore);
            scene.trace(query);

            if !query.hit() {
                let ambient = scene
                    .environment()
                    .map(|e| e.evaluate(ray.direction()))
                    .unwrap_or_default();
                return ambient.extend(1.0);
            }

            let touch = scene.interact(query);
            if !touch.material.is_pass_through() {
                return touch.material.sample_albedo(touch.texcoord);
            }

            // Continue straight through clear surfaces
            ignore = if query.token.kind() == crate::token::TokenKind::Triangle {
                query.token
            } else {
                Token::INVALID
            };
            ray = Ray::shifted(touch.point, ray.direction());
        }

        Vec4::W
    }
}
