//! BVH cost evaluator: traversal-work heatmaps.

use std::sync::atomic::{AtomicU64, Ordering};

use bumpalo::Bump;
use ember_math::{Ray, Vec4};

use super::Evaluator;
use crate::bvh::TraceQuery;
use crate::prepare::PreparedScene;
use crate::rng::Sampler;

/// Measures BVH quality instead of radiance. Each call returns
/// (per-ray cost, running mean cost, running sample count, 1).
#[derive(Default)]
pub struct CostEvaluator {
    total_cost: AtomicU64,
    total_samples: AtomicU64,
}

impl CostEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative (cost, samples) so far.
    pub fn totals(&self) -> (u64, u64) {
        (
            self.total_cost.load(Ordering::Relaxed),
            self.total_samples.load(Ordering::Relaxed),
        )
    }
}

impl Evaluator for CostEvaluator {
    fn evaluate(
        &self,
        scene: &PreparedScene,
        ray: Ray,
        _sampler: &mut Sampler,
        _arena: &Bump,
        _query: &mut TraceQuery,
    ) -> Vec4 {
        let cost = scene.trace_cost(&ray) as u64;
        let total = self.total_cost.fetch_add(cost, Ordering::Relaxed) + cost;
        let samples = self.total_samples.fetch_add(1, Ordering::Relaxed) + 1;

        Vec4::new(cost as f32, total as f32 / samples as f32, samples as f32, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::{PrepareOptions, PreparedScene};
    use crate::rng::Sampler;
    use ember_core::{CameraSettings, Entity, Payload, Scene, Shape, SurfaceMaterial, Transform};
    use ember_math::{Vec3, Vec3A};
    use std::sync::Arc;

    #[test]
    fn test_cost_accumulates() {
        let mut scene = Scene::new("cost");
        scene.add(Entity::with_payload(
            "camera",
            Payload::Camera(CameraSettings::default()),
        ));
        for i in 0..16 {
            scene.add(
                Entity::with_payload(
                    format!("ball{i}"),
                    Payload::Shape {
                        shape: Shape::Sphere { radius: 0.4 },
                        material: Arc::new(SurfaceMaterial::default()),
                    },
                )
                .at(Transform::from_translation(Vec3::new(
                    (i % 4) as f32 * 2.0 - 3.0,
                    (i / 4) as f32 * 2.0 - 3.0,
                    -8.0,
                ))),
            );
        }
        let prepared = PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap();

        let evaluator = CostEvaluator::new();
        let arena = Bump::new();
        let ray = Ray::new(Vec3A::ZERO, -Vec3A::Z);
        let mut query = TraceQuery::new(ray);

        let mut sampler = Sampler::for_pixel_sample(1, 0, 0);
        let first = evaluator.evaluate(&prepared, ray, &mut sampler, &arena, &mut query);
        assert!(first.x >= 1.0);
        assert_eq!(first.z, 1.0);

        let second = evaluator.evaluate(&prepared, ray, &mut sampler, &arena, &mut query);
        assert_eq!(second.z, 2.0);
        // Same ray, same cost, so the running mean equals the cost
        assert!((second.y - second.x).abs() < 1e-6);

        let (cost, samples) = evaluator.totals();
        assert_eq!(samples, 2);
        assert_eq!(cost, 2 * first.x as u64);
    }
}
