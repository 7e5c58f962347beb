//! Radiance evaluators.
//!
//! An evaluator turns one primary ray into a linear radiance estimate.
//! The sampler supplies the deterministic per-sample stream, the arena
//! holds all per-ray scratch (BSDF lobes), and the trace query is the
//! worker's reusable traversal buffer.

mod albedo;
mod cost;
mod path;

pub use albedo::AlbedoEvaluator;
pub use cost::CostEvaluator;
pub use path::PathEvaluator;

use bumpalo::Bump;
use ember_math::{Ray, Vec4};

use crate::bvh::TraceQuery;
use crate::prepare::PreparedScene;
use crate::rng::Sampler;

/// One radiance estimate per call; alpha carries 1 for downstream
/// compositing.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        scene: &PreparedScene,
        ray: Ray,
        sampler: &mut Sampler,
        arena: &Bump,
        query: &mut TraceQuery,
    ) -> Vec4;
}
