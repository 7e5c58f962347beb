//! Tiled render engine.
//!
//! One worker thread per logical CPU pulls tiles from a queue,
//! accumulates pixels into a worker-local buffer, and merges whole
//! tiles into the shared render buffer. The state machine serializes
//! begin/pause/resume/abort under one lock; workers observe state at
//! tile and sample boundaries.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bumpalo::Bump;
use crossbeam_channel::Receiver;
use ember_math::{luminance, Ray, Vec3A, Vec4};
use parking_lot::{Condvar, Mutex};

use crate::buffer::{PixelAccumulator, RenderBuffer};
use crate::bvh::TraceQuery;
use crate::error::{RenderError, RenderResult};
use crate::evaluator::{AlbedoEvaluator, CostEvaluator, Evaluator, PathEvaluator};
use crate::prepare::PreparedScene;
use crate::profile::{EvaluatorKind, RenderProfile};
use crate::rng::Sampler;
use crate::tile::{generate_tiles, Tile};

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Ready,
    Rendering,
    Paused,
    Completed,
    Aborted,
}

impl EngineState {
    fn tag(self) -> u8 {
        match self {
            EngineState::Initializing => 0,
            EngineState::Ready => 1,
            EngineState::Rendering => 2,
            EngineState::Paused => 3,
            EngineState::Completed => 4,
            EngineState::Aborted => 5,
        }
    }
}

/// Relaxed progress counters; statistical, not consistency-critical.
#[derive(Default)]
struct Progress {
    pixels: AtomicU64,
    samples: AtomicU64,
    tiles: AtomicU64,
    nan_clamps: AtomicU64,
    panics: AtomicU64,
}

/// A point-in-time view of the render progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub pixels: u64,
    pub samples: u64,
    pub tiles: u64,
    pub tile_total: u64,
    pub nan_clamps: u64,
    pub panics: u64,
    pub traces: u64,
    pub occlusions: u64,
}

struct Shared {
    state: Mutex<EngineState>,

    /// Mirror of the state for cheap polling at sample boundaries
    state_tag: AtomicU8,
    state_changed: Condvar,

    tiles_remaining: AtomicUsize,
    tile_total: AtomicUsize,
    progress: Progress,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::Ready),
            state_tag: AtomicU8::new(EngineState::Ready.tag()),
            state_changed: Condvar::new(),
            tiles_remaining: AtomicUsize::new(0),
            tile_total: AtomicUsize::new(0),
            progress: Progress::default(),
        }
    }

    fn set_state(&self, state: &mut EngineState, next: EngineState) {
        *state = next;
        self.state_tag.store(next.tag(), Ordering::Release);
        self.state_changed.notify_all();
    }

    /// Sample-boundary check. Blocks while paused or while `begin` is
    /// still staging; false means stop.
    fn keep_rendering(&self) -> bool {
        let tag = self.state_tag.load(Ordering::Acquire);
        if tag == EngineState::Rendering.tag() {
            return true;
        }
        if tag == EngineState::Paused.tag() || tag == EngineState::Initializing.tag() {
            let mut state = self.state.lock();
            while matches!(*state, EngineState::Paused | EngineState::Initializing) {
                self.state_changed.wait(&mut state);
            }
            return *state == EngineState::Rendering;
        }
        false
    }

    /// Last tile merged: drain the render to completed.
    fn finish_render(&self) {
        let mut state = self.state.lock();
        if matches!(*state, EngineState::Rendering | EngineState::Paused) {
            self.set_state(&mut state, EngineState::Completed);
        }
    }

    fn abort_from_worker(&self) {
        let mut state = self.state.lock();
        if matches!(*state, EngineState::Rendering | EngineState::Paused) {
            self.set_state(&mut state, EngineState::Aborted);
        }
    }
}

/// Everything a worker thread needs.
struct WorkerContext {
    scene: Arc<PreparedScene>,
    buffer: Arc<Mutex<RenderBuffer>>,
    shared: Arc<Shared>,
    receiver: Receiver<Tile>,
    evaluator: Arc<dyn Evaluator>,
    profile: RenderProfile,
    width: u32,
}

/// The render engine.
///
/// Owns the prepared scene, the render buffer, and the worker pool.
pub struct Engine {
    scene: Arc<PreparedScene>,
    buffer: Arc<Mutex<RenderBuffer>>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Create an engine in the ready state with a cleared buffer.
    pub fn new(scene: Arc<PreparedScene>, width: u32, height: u32) -> RenderResult<Self> {
        let buffer = RenderBuffer::new(width, height)?;
        Ok(Self {
            scene,
            buffer: Arc::new(Mutex::new(buffer)),
            shared: Arc::new(Shared::new()),
            workers: Vec::new(),
        })
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        *self.shared.state.lock()
    }

    /// Progress counters, readable during a render.
    pub fn progress(&self) -> ProgressSnapshot {
        let progress = &self.shared.progress;
        ProgressSnapshot {
            pixels: progress.pixels.load(Ordering::Relaxed),
            samples: progress.samples.load(Ordering::Relaxed),
            tiles: progress.tiles.load(Ordering::Relaxed),
            tile_total: self.shared.tile_total.load(Ordering::Relaxed) as u64,
            nan_clamps: progress.nan_clamps.load(Ordering::Relaxed),
            panics: progress.panics.load(Ordering::Relaxed),
            traces: self.scene.counters().traces(),
            occlusions: self.scene.counters().occlusions(),
        }
    }

    /// A copy of the render buffer. Cheap enough for previews; take it
    /// after `wait()` for the final image.
    pub fn image(&self) -> RenderBuffer {
        self.buffer.lock().clone()
    }

    /// Start rendering with the given profile.
    ///
    /// Legal from ready, completed, or aborted; restarting clears the
    /// buffer.
    pub fn begin(&mut self, profile: RenderProfile) -> RenderResult<()> {
        profile.validate()?;

        {
            let mut state = self.shared.state.lock();
            match *state {
                EngineState::Ready | EngineState::Completed | EngineState::Aborted => {}
                current => {
                    return Err(RenderError::InvalidState {
                        operation: "begin",
                        state: current,
                    })
                }
            }
            self.shared.set_state(&mut state, EngineState::Initializing);
        }

        // Old workers have exited by now (state left rendering)
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        let (width, height) = {
            let mut buffer = self.buffer.lock();
            buffer.clear();
            (buffer.width(), buffer.height())
        };

        let tiles = generate_tiles(width, height, profile.tile_size);
        self.shared.tile_total.store(tiles.len(), Ordering::Relaxed);
        self.shared
            .tiles_remaining
            .store(tiles.len(), Ordering::Relaxed);
        self.shared.progress.pixels.store(0, Ordering::Relaxed);
        self.shared.progress.samples.store(0, Ordering::Relaxed);
        self.shared.progress.tiles.store(0, Ordering::Relaxed);
        self.shared.progress.nan_clamps.store(0, Ordering::Relaxed);

        let (sender, receiver) = crossbeam_channel::unbounded();
        for tile in tiles {
            // Unbounded channel: send cannot fail while receivers live
            let _ = sender.send(tile);
        }
        drop(sender);

        let evaluator: Arc<dyn Evaluator> = match profile.evaluator {
            EvaluatorKind::Path => Arc::new(PathEvaluator {
                bounce_limit: profile.bounce_limit,
                energy_epsilon: profile.energy_epsilon,
                roulette_start: profile.roulette_start,
            }),
            EvaluatorKind::Albedo => Arc::new(AlbedoEvaluator::default()),
            EvaluatorKind::BvhCost => Arc::new(CostEvaluator::new()),
        };

        log::info!(
            "Render begin: {}x{} pixels, {} workers, {}..{} spp",
            width,
            height,
            profile.worker_size,
            profile.base_sample,
            profile.adaptive_sample
        );

        for worker_id in 0..profile.worker_size {
            let context = WorkerContext {
                scene: self.scene.clone(),
                buffer: self.buffer.clone(),
                shared: self.shared.clone(),
                receiver: receiver.clone(),
                evaluator: evaluator.clone(),
                profile: profile.clone(),
                width,
            };

            let spawned = std::thread::Builder::new()
                .name(format!("ember-worker-{worker_id}"))
                .spawn(move || {
                    let shared = context.shared.clone();
                    // No exception may cross the worker boundary
                    if catch_unwind(AssertUnwindSafe(|| worker_loop(context))).is_err() {
                        shared.progress.panics.fetch_add(1, Ordering::Relaxed);
                        shared.abort_from_worker();
                    }
                });
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    // Release any workers already parked on Initializing
                    let mut state = self.shared.state.lock();
                    self.shared.set_state(&mut state, EngineState::Aborted);
                    return Err(RenderError::InvalidProfile(format!(
                        "failed to spawn worker: {e}"
                    )));
                }
            }
        }

        let mut state = self.shared.state.lock();
        self.shared.set_state(&mut state, EngineState::Rendering);
        Ok(())
    }

    /// Suspend workers at their next boundary.
    pub fn pause(&self) -> RenderResult<()> {
        let mut state = self.shared.state.lock();
        if *state != EngineState::Rendering {
            return Err(RenderError::InvalidState {
                operation: "pause",
                state: *state,
            });
        }
        self.shared.set_state(&mut state, EngineState::Paused);
        Ok(())
    }

    /// Resume a paused render.
    pub fn resume(&self) -> RenderResult<()> {
        let mut state = self.shared.state.lock();
        if *state != EngineState::Paused {
            return Err(RenderError::InvalidState {
                operation: "resume",
                state: *state,
            });
        }
        self.shared.set_state(&mut state, EngineState::Rendering);
        Ok(())
    }

    /// Cancel the render; workers exit at their next boundary.
    pub fn abort(&self) -> RenderResult<()> {
        let mut state = self.shared.state.lock();
        if !matches!(*state, EngineState::Rendering | EngineState::Paused) {
            return Err(RenderError::InvalidState {
                operation: "abort",
                state: *state,
            });
        }
        self.shared.set_state(&mut state, EngineState::Aborted);
        Ok(())
    }

    /// Block until the render completes or aborts; returns the final
    /// state. Joining the workers establishes the full memory barrier
    /// that publishes every pixel.
    pub fn wait(&mut self) -> EngineState {
        {
            let mut state = self.shared.state.lock();
            while matches!(
                *state,
                EngineState::Initializing | EngineState::Rendering | EngineState::Paused
            ) {
                self.shared.state_changed.wait(&mut state);
            }
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.state()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.abort();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(context: WorkerContext) {
    let mut arena = Bump::new();
    let mut query = TraceQuery::new(Ray::new(Vec3A::ZERO, Vec3A::Z));
    let mut local: Vec<PixelAccumulator> = Vec::new();

    loop {
        if !context.shared.keep_rendering() {
            break;
        }
        let Ok(tile) = context.receiver.try_recv() else {
            // Queue drained; remaining tiles are owned by other workers
            break;
        };
        if !render_tile(&context, &tile, &mut arena, &mut query, &mut local) {
            break;
        }
    }
}

/// Render one tile into a worker-local buffer, then merge it. Returns
/// false when the render was aborted mid-tile.
fn render_tile(
    context: &WorkerContext,
    tile: &Tile,
    arena: &mut Bump,
    query: &mut TraceQuery,
    local: &mut Vec<PixelAccumulator>,
) -> bool {
    let profile = &context.profile;
    let camera = context.scene.camera();

    local.clear();
    local.resize(tile.pixel_count() as usize, PixelAccumulator::default());

    for (x, y) in tile.pixels() {
        let pixel_index = (y as u64) * context.width as u64 + x as u64;
        let slot = ((y - tile.y) * tile.width + (x - tile.x)) as usize;

        // Welford accumulation over luminance for the adaptive stop
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;

        for sample_index in 0..profile.adaptive_sample {
            if !context.shared.keep_rendering() {
                return false;
            }

            let mut sampler = Sampler::for_pixel_sample(profile.seed, pixel_index, sample_index);
            arena.reset();

            let jitter = sampler.next_2d();
            let lens = sampler.next_2d();
            let ray = camera.spawn((x, y), jitter, lens);

            let mut value =
                context
                    .evaluator
                    .evaluate(&context.scene, ray, &mut sampler, arena, query);
            if !value.is_finite() {
                // Numerical mishaps clamp to black and get counted
                value = Vec4::new(0.0, 0.0, 0.0, 1.0);
                context
                    .shared
                    .progress
                    .nan_clamps
                    .fetch_add(1, Ordering::Relaxed);
            }

            local[slot].add(value, 1.0);
            context
                .shared
                .progress
                .samples
                .fetch_add(1, Ordering::Relaxed);

            let count = (sample_index + 1) as f64;
            let lum = luminance(Vec3A::new(value.x, value.y, value.z)) as f64;
            let delta = lum - mean;
            mean += delta / count;
            m2 += delta * (lum - mean);

            if sample_index + 1 >= profile.base_sample
                && converged(mean, m2, count, profile.adaptive_threshold)
            {
                break;
            }
        }

        context.shared.progress.pixels.fetch_add(1, Ordering::Relaxed);
    }

    {
        let mut buffer = context.buffer.lock();
        buffer.merge_tile((tile.x, tile.y), (tile.width, tile.height), local);
    }
    context.shared.progress.tiles.fetch_add(1, Ordering::Relaxed);

    if context.shared.tiles_remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
        context.shared.finish_render();
    }
    true
}

/// 95% confidence-interval test on the pixel's luminance mean.
fn converged(mean: f64, m2: f64, count: f64, threshold: f32) -> bool {
    if threshold <= 0.0 || count < 2.0 {
        return false;
    }
    let variance = m2 / (count - 1.0);
    let interval = 1.96 * (variance / count).sqrt();
    // The floor keeps near-black pixels from oversampling forever
    interval <= threshold as f64 * mean.max(0.05)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{
        CameraSettings, Entity, EnvironmentSource, LightSource, Payload, Scene, Shape,
        SurfaceMaterial, Transform,
    };
    use ember_math::Vec3;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::prepare::{PrepareOptions, PreparedScene};

    fn test_scene() -> Arc<PreparedScene> {
        let mut scene = Scene::new("engine-test");
        scene.add(Entity::with_payload(
            "camera",
            Payload::Camera(CameraSettings::default()),
        ));
        scene.add(Entity::with_payload(
            "sky",
            Payload::Light(LightSource::Ambient(EnvironmentSource::Constant(
                Vec3A::ONE,
            ))),
        ));
        scene.add(
            Entity::with_payload(
                "ball",
                Payload::Shape {
                    shape: Shape::Sphere { radius: 1.0 },
                    material: Arc::new(SurfaceMaterial::diffuse("grey", Vec3A::splat(0.5))),
                },
            )
            .at(Transform::from_translation(Vec3::new(0.0, 0.0, -5.0))),
        );
        Arc::new(PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap())
    }

    fn quick_profile() -> RenderProfile {
        RenderProfile {
            worker_size: 2,
            tile_size: 8,
            base_sample: 2,
            adaptive_sample: 2,
            bounce_limit: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_render_completes() {
        let mut engine = Engine::new(test_scene(), 32, 32).unwrap();
        assert_eq!(engine.state(), EngineState::Ready);

        engine.begin(quick_profile()).unwrap();
        let state = engine.wait();
        assert_eq!(state, EngineState::Completed);

        let progress = engine.progress();
        assert_eq!(progress.pixels, 32 * 32);
        assert_eq!(progress.samples, 32 * 32 * 2);
        assert_eq!(progress.tiles, progress.tile_total);
        assert_eq!(progress.panics, 0);
        assert!(progress.traces > 0);

        // Ambient background pixel
        let image = engine.image();
        let corner = image.mean(0, 0);
        assert!((corner.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_scene_white_ambient_image() {
        // 16x16, ambient white: every pixel must be (1,1,1,1)
        let mut scene = Scene::new("white");
        scene.add(Entity::with_payload(
            "camera",
            Payload::Camera(CameraSettings::default()),
        ));
        scene.add(Entity::with_payload(
            "sky",
            Payload::Light(LightSource::Ambient(EnvironmentSource::Constant(
                Vec3A::ONE,
            ))),
        ));
        let prepared =
            Arc::new(PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap());

        let mut engine = Engine::new(prepared, 16, 16).unwrap();
        let mut profile = quick_profile();
        profile.base_sample = 1;
        profile.adaptive_sample = 1;
        engine.begin(profile).unwrap();
        assert_eq!(engine.wait(), EngineState::Completed);

        let image = engine.image();
        for y in 0..16 {
            for x in 0..16 {
                let pixel = image.mean(x, y);
                assert!((pixel - Vec4::ONE).abs().max_element() < 1e-6);
            }
        }
    }

    #[test]
    fn test_illegal_transitions() {
        let mut engine = Engine::new(test_scene(), 16, 16).unwrap();

        // Nothing to pause/resume/abort before begin
        assert!(matches!(
            engine.pause(),
            Err(RenderError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.resume(),
            Err(RenderError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.abort(),
            Err(RenderError::InvalidState { .. })
        ));

        // begin while rendering is illegal
        let slow = RenderProfile {
            worker_size: 1,
            base_sample: 64,
            adaptive_sample: 64,
            ..quick_profile()
        };
        engine.begin(slow.clone()).unwrap();
        if engine.state() == EngineState::Rendering {
            assert!(matches!(
                engine.begin(slow),
                Err(RenderError::InvalidState { .. })
            ));
        }
        engine.wait();
    }

    #[test]
    fn test_invalid_profile_rejected_by_begin() {
        let mut engine = Engine::new(test_scene(), 16, 16).unwrap();
        let mut profile = quick_profile();
        profile.worker_size = 0;
        assert!(matches!(
            engine.begin(profile),
            Err(RenderError::InvalidProfile(_))
        ));
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_pause_resume_abort() {
        let mut engine = Engine::new(test_scene(), 64, 64).unwrap();
        let profile = RenderProfile {
            worker_size: 2,
            base_sample: 32,
            adaptive_sample: 32,
            ..quick_profile()
        };
        engine.begin(profile).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        if engine.pause().is_ok() {
            let frozen = engine.progress();
            std::thread::sleep(Duration::from_millis(30));
            let still = engine.progress();
            assert_eq!(frozen.samples, still.samples);

            engine.resume().unwrap();
        }

        std::thread::sleep(Duration::from_millis(5));
        // Abort may race completion; both outcomes are terminal
        let _ = engine.abort();
        let state = engine.wait();
        assert!(matches!(
            state,
            EngineState::Aborted | EngineState::Completed
        ));
    }

    #[test]
    fn test_determinism_across_runs() {
        let scene = test_scene();

        let render = |workers: usize| {
            let mut engine = Engine::new(scene.clone(), 24, 24).unwrap();
            let profile = RenderProfile {
                worker_size: workers,
                seed: 99,
                ..quick_profile()
            };
            engine.begin(profile).unwrap();
            assert_eq!(engine.wait(), EngineState::Completed);
            engine.image()
        };

        let a = render(1);
        let b = render(4);

        // Same seed: bit-identical regardless of worker count
        for y in 0..24 {
            for x in 0..24 {
                assert_eq!(a.mean(x, y), b.mean(x, y), "pixel ({x},{y}) differs");
            }
        }
    }

    #[test]
    fn test_rerender_after_completion() {
        let mut engine = Engine::new(test_scene(), 16, 16).unwrap();
        engine.begin(quick_profile()).unwrap();
        assert_eq!(engine.wait(), EngineState::Completed);
        let first = engine.progress().samples;

        engine.begin(quick_profile()).unwrap();
        assert_eq!(engine.wait(), EngineState::Completed);
        // Counters reset between renders
        assert_eq!(engine.progress().samples, first);
    }

    #[test]
    fn test_adaptive_sampling_spends_more_on_noise() {
        // Half the image sees a sphere edge (noisy), half flat ambient
        let mut engine = Engine::new(test_scene(), 32, 32).unwrap();
        let profile = RenderProfile {
            worker_size: 2,
            base_sample: 4,
            adaptive_sample: 64,
            adaptive_threshold: 0.02,
            ..quick_profile()
        };
        engine.begin(profile).unwrap();
        assert_eq!(engine.wait(), EngineState::Completed);

        let image = engine.image();
        // Flat ambient corner converges at the base sample count
        assert_eq!(image.pixel(0, 0).count, 4);
        // At least some pixels took extra samples
        let max_count = (0..32)
            .flat_map(|y| (0..32).map(move |x| (x, y)))
            .map(|(x, y)| image.pixel(x, y).count)
            .max()
            .unwrap();
        assert!(max_count > 4, "no pixel sampled adaptively");
    }
}
