//! Render profile: everything a `begin` call needs.

use ember_math::Vec3A;

use crate::error::{RenderError, RenderResult};
use crate::tile::DEFAULT_TILE_SIZE;

/// Which evaluator drives the render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluatorKind {
    /// Full light transport
    #[default]
    Path,

    /// Flat base color (feature buffer)
    Albedo,

    /// BVH traversal-cost heatmap
    BvhCost,
}

/// Settings for one render.
#[derive(Debug, Clone)]
pub struct RenderProfile {
    /// Worker thread count
    pub worker_size: usize,

    /// Tile edge in pixels
    pub tile_size: u32,

    /// Samples taken for every pixel
    pub base_sample: u32,

    /// Sample cap for pixels that fail the convergence test
    pub adaptive_sample: u32,

    /// Relative confidence-interval width below which a pixel stops
    pub adaptive_threshold: f32,

    /// Maximum surface bounces per path
    pub bounce_limit: u32,

    /// Per-channel throughput cutoff
    pub energy_epsilon: Vec3A,

    /// First bounce where Russian roulette applies
    pub roulette_start: u32,

    /// Global seed; equal seeds reproduce bit-identical images
    pub seed: u64,

    /// Evaluator selection
    pub evaluator: EvaluatorKind,
}

impl Default for RenderProfile {
    fn default() -> Self {
        Self {
            worker_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            tile_size: DEFAULT_TILE_SIZE,
            base_sample: 16,
            adaptive_sample: 64,
            adaptive_threshold: 0.02,
            bounce_limit: 8,
            energy_epsilon: Vec3A::splat(1e-4),
            roulette_start: 3,
            seed: 0,
            evaluator: EvaluatorKind::Path,
        }
    }
}

impl RenderProfile {
    pub fn validate(&self) -> RenderResult<()> {
        if self.worker_size == 0 {
            return Err(RenderError::InvalidProfile(
                "worker_size must be at least 1".into(),
            ));
        }
        if self.tile_size == 0 {
            return Err(RenderError::InvalidProfile(
                "tile_size must be at least 1".into(),
            ));
        }
        if self.base_sample == 0 {
            return Err(RenderError::InvalidProfile(
                "base_sample must be at least 1".into(),
            ));
        }
        if self.adaptive_sample < self.base_sample {
            return Err(RenderError::InvalidProfile(format!(
                "adaptive_sample {} below base_sample {}",
                self.adaptive_sample, self.base_sample
            )));
        }
        if self.bounce_limit == 0 {
            return Err(RenderError::InvalidProfile(
                "bounce_limit must be at least 1".into(),
            ));
        }
        if self.energy_epsilon.min_element() < 0.0 {
            return Err(RenderError::InvalidProfile(format!(
                "energy_epsilon has negative components: {:?}",
                self.energy_epsilon
            )));
        }
        if !(self.adaptive_threshold >= 0.0) {
            return Err(RenderError::InvalidProfile(
                "adaptive_threshold must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Quick low-quality preset for previews and tests.
    pub fn preview() -> Self {
        Self {
            base_sample: 2,
            adaptive_sample: 2,
            bounce_limit: 3,
            ..Default::default()
        }
    }
}
