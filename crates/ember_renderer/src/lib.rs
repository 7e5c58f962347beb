//! Ember Renderer - CPU Path Tracing
//!
//! A Monte Carlo path tracer over an immutable prepared scene: flat
//! primitive arrays under a SAH-built BVH, arena-allocated BSDFs, and a
//! tiled multi-threaded engine with pause/resume/abort.

mod buffer;
mod bvh;
mod camera;
mod engine;
mod environment;
mod error;
mod evaluator;
mod interaction;
mod light;
mod material;
mod prepare;
mod profile;
mod rng;
mod sampling;
mod sphere;
mod tile;
mod token;
mod triangle;

pub mod bsdf;

pub use buffer::{PixelAccumulator, RenderBuffer};
pub use bvh::{trace_linear, Bvh, Geometry, TraceQuery};
pub use camera::Camera;
pub use engine::{Engine, EngineState, ProgressSnapshot};
pub use environment::Environment;
pub use error::{RenderError, RenderResult};
pub use evaluator::{AlbedoEvaluator, CostEvaluator, Evaluator, PathEvaluator};
pub use interaction::Interaction;
pub use light::{Light, LightSample, PowerDistribution};
pub use material::PressedMaterial;
pub use prepare::{PrepareOptions, PreparedScene, TraceCounters};
pub use profile::{EvaluatorKind, RenderProfile};
pub use rng::{hash_mix, sample_seed, Pcg32, Sample1, Sample2, Sampler};
pub use sampling::{
    concentric_sample_disk, cosine_hemisphere_pdf, cosine_sample_hemisphere, power_heuristic,
    uniform_sample_sphere, uniform_sample_triangle, uniform_sphere_pdf, Distribution1D,
    Distribution2D,
};
pub use sphere::PreparedSphere;
pub use tile::{generate_tiles, morton_decode, morton_encode, Tile, DEFAULT_TILE_SIZE};
pub use token::{Token, TokenKind};
pub use triangle::PreparedTriangle;

/// Re-export the math types the public API speaks in
pub use ember_math::{Aabb, Ray, Vec2, Vec3A, Vec4};
