//! Prepared scene construction.
//!
//! Presses the mutable entity tree into the immutable form the workers
//! trace against: flat primitive arrays, pressed materials, gathered
//! lights, a power distribution, and the BVH. Construction is
//! fail-fast; the result never changes during a render.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ember_core::{LightSource, Payload, RawSphere, RawTriangle, Scene, SurfaceMaterial};
use ember_math::{Aabb, Mat4, Ray, Vec3A};

use crate::bvh::{trace_linear, Bvh, Geometry, TraceQuery};
use crate::camera::Camera;
use crate::environment::Environment;
use crate::error::{RenderError, RenderResult};
use crate::interaction::Interaction;
use crate::light::{Light, LightSample, PowerDistribution};
use crate::material::PressedMaterial;
use crate::rng::{Sample1, Sample2};
use crate::sphere::PreparedSphere;
use crate::token::{Token, TokenKind};
use crate::triangle::PreparedTriangle;

/// Tuning knobs for scene preparation.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Triangles larger than this multiple of the mean area are split
    pub fragmentation_threshold: f32,

    /// Cap on recursive subdivision levels per triangle
    pub fragmentation_limit: u32,

    /// Resolution the camera is pressed for
    pub resolution: (u32, u32),
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            fragmentation_threshold: 4.8,
            fragmentation_limit: 3,
            resolution: (640, 480),
        }
    }
}

impl PrepareOptions {
    pub fn validate(&self) -> RenderResult<()> {
        if !(self.fragmentation_threshold > 0.0) {
            return Err(RenderError::InvalidProfile(format!(
                "fragmentation threshold must be positive, got {}",
                self.fragmentation_threshold
            )));
        }
        if self.fragmentation_limit > 8 {
            return Err(RenderError::InvalidProfile(format!(
                "fragmentation limit {} would explode triangle counts",
                self.fragmentation_limit
            )));
        }
        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(RenderError::InvalidBuffer(
                "render resolution must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Relaxed instrumentation counters, readable during a render.
#[derive(Default, Debug)]
pub struct TraceCounters {
    traces: AtomicU64,
    occlusions: AtomicU64,
}

impl TraceCounters {
    pub fn traces(&self) -> u64 {
        self.traces.load(Ordering::Relaxed)
    }

    pub fn occlusions(&self) -> u64 {
        self.occlusions.load(Ordering::Relaxed)
    }
}

/// The immutable render-ready scene.
#[derive(Debug)]
pub struct PreparedScene {
    triangles: Vec<PreparedTriangle>,
    spheres: Vec<PreparedSphere>,
    materials: Vec<PressedMaterial>,
    lights: Vec<Light>,
    environment: Option<Environment>,
    power_distribution: PowerDistribution,
    camera: Camera,
    bvh: Bvh,
    bounds: Aabb,
    counters: TraceCounters,

    /// Light index of the ambient entry, if any
    ambient_index: Option<usize>,

    /// Light index per emissive primitive, for MIS on BSDF-sampled hits
    light_by_token: std::collections::HashMap<Token, usize>,
}

impl PreparedScene {
    /// Press a source scene. Fails fast on an invalid scene.
    pub fn prepare(scene: &Scene, options: &PrepareOptions) -> RenderResult<Self> {
        options.validate()?;

        let mut builder = Builder::default();
        let mut error = None;
        scene.visit(|entity, world| {
            if error.is_some() {
                return;
            }
            if let Err(e) = builder.visit(entity, world) {
                error = Some(e);
            }
        });
        if let Some(e) = error {
            return Err(e);
        }

        let camera = match builder.camera {
            Some((settings, world)) => Camera::new(&settings, &world, options.resolution),
            None => return Err(RenderError::InvalidScene("scene has no camera".into())),
        };

        // Press materials in registry order
        let materials: Vec<PressedMaterial> = builder
            .materials
            .iter()
            .map(|m| PressedMaterial::press(m.clone()))
            .collect();

        let raw_triangles = fragment_triangles(
            builder.triangles,
            options.fragmentation_threshold,
            options.fragmentation_limit,
        );

        let mut triangles = Vec::with_capacity(raw_triangles.len());
        for raw in &raw_triangles {
            if raw.positions.iter().any(|p| !p.is_finite()) {
                return Err(RenderError::InvalidScene(
                    "triangle with non-finite vertices".into(),
                ));
            }
            // Zero-area triangles are dropped rather than traced
            if let Some(triangle) = PreparedTriangle::new(raw) {
                triangles.push(triangle);
            }
        }
        let mut spheres = Vec::with_capacity(builder.spheres.len());
        for raw in &builder.spheres {
            if !raw.center.is_finite() || !raw.radius.is_finite() {
                return Err(RenderError::InvalidScene(
                    "sphere with non-finite coordinates".into(),
                ));
            }
            spheres.push(PreparedSphere::new(raw.center, raw.radius, raw.material));
        }

        // Bounds + BVH input
        let mut bounds = Aabb::EMPTY;
        let mut items: Vec<(Aabb, Token)> =
            Vec::with_capacity(triangles.len() + spheres.len());
        for (i, triangle) in triangles.iter().enumerate() {
            let aabb = triangle.aabb();
            bounds.encapsulate_box(&aabb);
            items.push((aabb, Token::triangle(i)));
        }
        for (i, sphere) in spheres.iter().enumerate() {
            let aabb = sphere.aabb();
            bounds.encapsulate_box(&aabb);
            items.push((aabb, Token::sphere(i)));
        }
        let bvh = Bvh::build(&items);

        // Gather lights: explicit ones plus every emissive primitive
        let environment = builder.environment.as_ref().map(Environment::prepare);
        let mut lights = builder.lights;
        for (i, triangle) in triangles.iter().enumerate() {
            let material = &materials[triangle.material() as usize];
            if material.is_emissive() {
                lights.push(Light::Area {
                    token: Token::triangle(i),
                    radiance: material.emission(),
                });
            }
        }
        for (i, sphere) in spheres.iter().enumerate() {
            let material = &materials[sphere.material() as usize];
            if material.is_emissive() {
                lights.push(Light::Area {
                    token: Token::sphere(i),
                    radiance: material.emission(),
                });
            }
        }
        let mut ambient_index = None;
        if environment.is_some() {
            ambient_index = Some(lights.len());
            lights.push(Light::Ambient);
        }
        let light_by_token: std::collections::HashMap<Token, usize> = lights
            .iter()
            .enumerate()
            .filter_map(|(i, light)| match light {
                Light::Area { token, .. } => Some((*token, i)),
                _ => None,
            })
            .collect();

        let scene_radius = if bounds.is_valid() {
            bounds.bounding_radius().max(1.0)
        } else {
            1.0
        };
        let geometry = Geometry {
            triangles: &triangles,
            spheres: &spheres,
        };
        let power_distribution =
            PowerDistribution::new(&lights, &geometry, environment.as_ref(), scene_radius);

        log::info!(
            "Prepared scene '{}': {} triangles ({} raw), {} spheres, {} materials, {} lights",
            scene.name,
            triangles.len(),
            builder.raw_triangle_count,
            spheres.len(),
            materials.len(),
            lights.len()
        );

        Ok(Self {
            triangles,
            spheres,
            materials,
            lights,
            environment,
            power_distribution,
            camera,
            bvh,
            bounds,
            counters: TraceCounters::default(),
            ambient_index,
            light_by_token,
        })
    }

    /// Primitive slices for traversal.
    #[inline]
    pub fn geometry(&self) -> Geometry<'_> {
        Geometry {
            triangles: &self.triangles,
            spheres: &self.spheres,
        }
    }

    /// Nearest-hit query through the BVH.
    pub fn trace(&self, query: &mut TraceQuery) {
        self.counters.traces.fetch_add(1, Ordering::Relaxed);
        self.bvh.trace(&self.geometry(), query);
    }

    /// Any-hit query within the query's distance bound.
    pub fn occlude(&self, query: &mut TraceQuery) -> bool {
        self.counters.occlusions.fetch_add(1, Ordering::Relaxed);
        self.bvh.occlude(&self.geometry(), query)
    }

    /// Reference tracer bypassing the BVH.
    pub fn trace_reference(&self, query: &mut TraceQuery) {
        trace_linear(&self.geometry(), query);
    }

    /// Approximate BVH work for a ray.
    pub fn trace_cost(&self, ray: &Ray) -> u32 {
        self.bvh.trace_cost(ray)
    }

    /// Build the interaction packet for a completed trace query.
    /// Must only be called when `query.hit()`.
    pub fn interact(&self, query: &TraceQuery) -> Interaction<'_> {
        let point = query.ray.at(query.distance);
        let outgoing = -query.ray.direction();

        let (geometric_normal, mut shading_normal, texcoord, material) = match query.token.kind()
        {
            TokenKind::Triangle => {
                let triangle = &self.triangles[query.token.index()];
                (
                    triangle.geometric_normal(),
                    triangle.shading_normal(query.uv),
                    triangle.texcoord(query.uv),
                    triangle.material(),
                )
            }
            TokenKind::Sphere => {
                let sphere = &self.spheres[query.token.index()];
                let normal = sphere.normal_at(point);
                (normal, normal, query.uv, sphere.material())
            }
            _ => unreachable!("interact on a non-geometry token"),
        };

        let material = &self.materials[material as usize];
        material.apply_normal_mapping(texcoord, &mut shading_normal);

        Interaction {
            point,
            geometric_normal,
            shading_normal,
            outgoing,
            texcoord,
            material,
            token: query.token,
        }
    }

    /// Pick a light by power and sample it.
    /// Returns (sample, light index, selection pmf, is_delta).
    pub fn sample_light(
        &self,
        point: Vec3A,
        pick: Sample1,
        u: Sample2,
    ) -> Option<(LightSample, usize, f32, bool)> {
        if self.lights.is_empty() {
            return None;
        }
        let (index, pmf) = self.power_distribution.sample(pick.0);
        let light = &self.lights[index];
        let sample = light.sample(&self.geometry(), self.environment.as_ref(), point, u)?;
        Some((sample, index, pmf, light.is_delta()))
    }

    /// Solid-angle density of the light at `index` for a direction.
    pub fn light_pdf(&self, index: usize, point: Vec3A, incident: Vec3A) -> f32 {
        self.lights[index].pdf(
            &self.geometry(),
            self.environment.as_ref(),
            point,
            incident,
        )
    }

    /// Selection probability of a light in the power distribution.
    pub fn light_select_pdf(&self, index: usize) -> f32 {
        self.power_distribution.pdf(index)
    }

    /// Light index of the ambient entry.
    pub fn ambient_index(&self) -> Option<usize> {
        self.ambient_index
    }

    /// Light index of an emissive primitive.
    pub fn light_index_of(&self, token: Token) -> Option<usize> {
        self.light_by_token.get(&token).copied()
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn materials(&self) -> &[PressedMaterial] {
        &self.materials
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn counters(&self) -> &TraceCounters {
        &self.counters
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn sphere_count(&self) -> usize {
        self.spheres.len()
    }
}

/// Scene-walk accumulator.
#[derive(Default)]
struct Builder {
    camera: Option<(ember_core::CameraSettings, Mat4)>,
    materials: Vec<Arc<SurfaceMaterial>>,
    triangles: Vec<RawTriangle>,
    spheres: Vec<RawSphere>,
    lights: Vec<Light>,
    environment: Option<ember_core::EnvironmentSource>,
    raw_triangle_count: usize,
}

impl Builder {
    fn visit(&mut self, entity: &ember_core::Entity, world: &Mat4) -> RenderResult<()> {
        if entity.transform.scale.min_element() <= 0.0 {
            return Err(RenderError::InvalidScene(format!(
                "entity '{}' has non-positive scale {:?}",
                entity.name, entity.transform.scale
            )));
        }
        if (entity.transform.rotation.length_squared() - 1.0).abs() > 1e-3 {
            return Err(RenderError::InvalidScene(format!(
                "entity '{}' has a non-unit rotation versor",
                entity.name
            )));
        }

        match &entity.payload {
            Payload::Group => {}
            Payload::Camera(settings) => {
                if self.camera.is_some() {
                    log::warn!("duplicate camera '{}' ignored; first one wins", entity.name);
                } else {
                    self.camera = Some((settings.clone(), *world));
                }
            }
            Payload::Light(source) => match source {
                LightSource::Point { intensity } => self.lights.push(Light::Point {
                    position: world.transform_point3a(Vec3A::ZERO),
                    intensity: *intensity,
                }),
                LightSource::Directional { radiance } => self.lights.push(Light::Directional {
                    direction: world.transform_vector3a(-Vec3A::Z).normalize(),
                    radiance: *radiance,
                }),
                LightSource::Ambient(environment) => {
                    if self.environment.is_some() {
                        log::warn!("duplicate ambient light '{}' ignored", entity.name);
                    } else {
                        self.environment = Some(environment.clone());
                    }
                }
            },
            Payload::Shape { shape, material } => {
                let index = self.material_index(material);
                let triangles = shape.triangles(world, index);
                self.raw_triangle_count += triangles.len();
                self.triangles.extend(triangles);
                self.spheres.extend(shape.spheres(world, index));
            }
        }
        Ok(())
    }

    /// Registry lookup by pointer identity; new materials get the next
    /// index.
    fn material_index(&mut self, material: &Arc<SurfaceMaterial>) -> u32 {
        for (i, known) in self.materials.iter().enumerate() {
            if Arc::ptr_eq(known, material) {
                return i as u32;
            }
        }
        self.materials.push(material.clone());
        (self.materials.len() - 1) as u32
    }
}

/// Area of a raw triangle.
fn raw_area(triangle: &RawTriangle) -> f32 {
    let [a, b, c] = triangle.positions;
    (b - a).cross(c - a).length() * 0.5
}

/// Split triangles much larger than the mean so the BVH stays balanced
/// over long thin meshes.
fn fragment_triangles(
    triangles: Vec<RawTriangle>,
    threshold_factor: f32,
    max_levels: u32,
) -> Vec<RawTriangle> {
    if triangles.is_empty() || max_levels == 0 {
        return triangles;
    }

    let mean_area: f32 =
        triangles.iter().map(raw_area).sum::<f32>() / triangles.len() as f32;
    let threshold = mean_area * threshold_factor;
    if !(threshold > 0.0) {
        return triangles;
    }

    let mut out = Vec::with_capacity(triangles.len());
    let mut fragmented = 0usize;
    for triangle in triangles {
        let area = raw_area(&triangle);
        if area <= threshold {
            out.push(triangle);
            continue;
        }

        let levels = ((area / threshold).log2().ceil() as u32).clamp(1, max_levels);
        fragmented += 1;
        subdivide_into(&triangle, levels, &mut out);
    }

    if fragmented > 0 {
        log::debug!(
            "Fragmented {} oversized triangles into {} total",
            fragmented,
            out.len()
        );
    }
    out
}

/// Emit the 4^levels sub-triangles of a uniform midpoint subdivision.
fn subdivide_into(triangle: &RawTriangle, levels: u32, out: &mut Vec<RawTriangle>) {
    if levels == 0 {
        out.push(triangle.clone());
        return;
    }

    let [p0, p1, p2] = triangle.positions;
    let m01 = (p0 + p1) * 0.5;
    let m12 = (p1 + p2) * 0.5;
    let m20 = (p2 + p0) * 0.5;

    let [t0, t1, t2] = triangle.texcoords;
    let t01 = (t0 + t1) * 0.5;
    let t12 = (t1 + t2) * 0.5;
    let t20 = (t2 + t0) * 0.5;

    let mid_normals = triangle.normals.map(|[n0, n1, n2]| {
        [
            ((n0 + n1) * 0.5).normalize(),
            ((n1 + n2) * 0.5).normalize(),
            ((n2 + n0) * 0.5).normalize(),
        ]
    });
    let pick =
        |a: usize, b: usize, c: usize, mids: &Option<[Vec3A; 3]>| -> Option<[Vec3A; 3]> {
            let corner = triangle.normals?;
            let mids = mids.as_ref()?;
            let get = |i: usize| if i < 3 { corner[i] } else { mids[i - 3] };
            Some([get(a), get(b), get(c)])
        };

    // Corner triangles plus the center one, indices 0..2 = corners,
    // 3..5 = midpoints (01, 12, 20)
    let children = [
        ([p0, m01, m20], [t0, t01, t20], pick(0, 3, 5, &mid_normals)),
        ([m01, p1, m12], [t01, t1, t12], pick(3, 1, 4, &mid_normals)),
        ([m20, m12, p2], [t20, t12, t2], pick(5, 4, 2, &mid_normals)),
        ([m01, m12, m20], [t01, t12, t20], pick(3, 4, 5, &mid_normals)),
    ];

    for (positions, texcoords, normals) in children {
        let child = RawTriangle {
            positions,
            texcoords,
            normals,
            material: triangle.material,
        };
        subdivide_into(&child, levels - 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{
        CameraSettings, Entity, EnvironmentSource, Mesh, Payload, Shape, Transform,
    };
    use ember_math::{Vec2, Vec3};

    fn basic_scene() -> Scene {
        let mut scene = Scene::new("test");
        scene.add(Entity::with_payload(
            "camera",
            Payload::Camera(CameraSettings::default()),
        ));
        scene.add(Entity::with_payload(
            "ball",
            Payload::Shape {
                shape: Shape::Sphere { radius: 1.0 },
                material: Arc::new(SurfaceMaterial::diffuse("grey", Vec3A::splat(0.5))),
            },
        )
        .at(Transform::from_translation(Vec3::new(0.0, 0.0, -5.0))));
        scene.add(Entity::with_payload(
            "sky",
            Payload::Light(LightSource::Ambient(EnvironmentSource::Constant(
                Vec3A::ONE,
            ))),
        ));
        scene
    }

    #[test]
    fn test_prepare_basic_scene() {
        let prepared = PreparedScene::prepare(&basic_scene(), &PrepareOptions::default()).unwrap();
        assert_eq!(prepared.sphere_count(), 1);
        assert_eq!(prepared.materials().len(), 1);
        // Ambient registers as a light
        assert_eq!(prepared.lights().len(), 1);
        assert!(prepared.environment().is_some());
    }

    #[test]
    fn test_prepare_requires_camera() {
        let mut scene = Scene::new("empty");
        scene.add(Entity::with_payload(
            "ball",
            Payload::Shape {
                shape: Shape::Sphere { radius: 1.0 },
                material: Arc::new(SurfaceMaterial::default()),
            },
        ));

        let err = PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidScene(_)));
    }

    #[test]
    fn test_prepare_rejects_negative_scale() {
        let mut scene = basic_scene();
        scene.add(
            Entity::with_payload(
                "bad",
                Payload::Shape {
                    shape: Shape::Sphere { radius: 1.0 },
                    material: Arc::new(SurfaceMaterial::default()),
                },
            )
            .at(Transform {
                scale: Vec3::new(1.0, -1.0, 1.0),
                ..Default::default()
            }),
        );

        let err = PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidScene(_)));
    }

    #[test]
    fn test_material_registry_monotone_and_deduplicated() {
        let shared = Arc::new(SurfaceMaterial::diffuse("shared", Vec3A::ONE));
        let mut scene = Scene::new("materials");
        scene.add(Entity::with_payload(
            "camera",
            Payload::Camera(CameraSettings::default()),
        ));
        for i in 0..3 {
            scene.add(
                Entity::with_payload(
                    format!("ball{i}"),
                    Payload::Shape {
                        shape: Shape::Sphere { radius: 0.5 },
                        material: shared.clone(),
                    },
                )
                .at(Transform::from_translation(Vec3::new(i as f32 * 2.0, 0.0, -5.0))),
            );
        }
        scene.add(Entity::with_payload(
            "other",
            Payload::Shape {
                shape: Shape::Sphere { radius: 0.5 },
                material: Arc::new(SurfaceMaterial::diffuse("unique", Vec3A::ONE)),
            },
        ));

        let prepared = PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap();
        assert_eq!(prepared.materials().len(), 2);
        assert_eq!(prepared.sphere_count(), 4);
    }

    #[test]
    fn test_emissive_primitives_become_area_lights() {
        let mut scene = basic_scene();
        scene.add(
            Entity::with_payload(
                "panel",
                Payload::Shape {
                    shape: Shape::Quad {
                        width: 1.0,
                        height: 1.0,
                    },
                    material: Arc::new(SurfaceMaterial::emissive("panel", Vec3A::splat(5.0))),
                },
            )
            .at(Transform::from_translation(Vec3::new(0.0, 3.0, -5.0))),
        );

        let prepared = PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap();
        let area_lights = prepared
            .lights()
            .iter()
            .filter(|l| matches!(l, Light::Area { .. }))
            .count();
        // The quad presses to two triangles, each an area light
        assert_eq!(area_lights, 2);
    }

    #[test]
    fn test_fragmentation_splits_oversized_triangles() {
        // One huge triangle among many small ones
        let mut positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(40.0, 0.0, 0.0),
            Vec3::new(0.0, 40.0, 0.0),
        ];
        let mut indices = vec![0u32, 1, 2];
        for i in 0..20 {
            let base = positions.len() as u32;
            let x = i as f32;
            positions.push(Vec3::new(x, 0.0, 1.0));
            positions.push(Vec3::new(x + 0.1, 0.0, 1.0));
            positions.push(Vec3::new(x, 0.1, 1.0));
            indices.extend([base, base + 1, base + 2]);
        }

        let mut scene = Scene::new("fragmentation");
        scene.add(Entity::with_payload(
            "camera",
            Payload::Camera(CameraSettings::default()),
        ));
        scene.add(Entity::with_payload(
            "mesh",
            Payload::Shape {
                shape: Shape::Mesh(Mesh::new(positions, indices, None)),
                material: Arc::new(SurfaceMaterial::default()),
            },
        ));

        let prepared = PreparedScene::prepare(&scene, &PrepareOptions::default()).unwrap();
        // Max fragmentation of the big triangle: 4^3 children + 20 small
        assert_eq!(prepared.triangle_count(), 64 + 20);
    }

    #[test]
    fn test_fragmentation_preserves_surface() {
        let triangle = RawTriangle {
            positions: [Vec3A::ZERO, Vec3A::new(4.0, 0.0, 0.0), Vec3A::new(0.0, 4.0, 0.0)],
            texcoords: [Vec2::ZERO, Vec2::X, Vec2::Y],
            normals: None,
            material: 0,
        };

        let mut out = Vec::new();
        subdivide_into(&triangle, 2, &mut out);
        assert_eq!(out.len(), 16);

        let total: f32 = out.iter().map(raw_area).sum();
        assert!((total - raw_area(&triangle)).abs() < 1e-4);

        // Texcoords subdivide with the surface
        for child in &out {
            for uv in child.texcoords {
                assert!(uv.x >= -1e-6 && uv.y >= -1e-6 && uv.x + uv.y <= 1.0 + 1e-5);
            }
        }
    }

    #[test]
    fn test_trace_and_interact() {
        let prepared = PreparedScene::prepare(&basic_scene(), &PrepareOptions::default()).unwrap();

        let ray = Ray::new(Vec3A::ZERO, -Vec3A::Z);
        let mut query = TraceQuery::new(ray);
        prepared.trace(&mut query);

        assert!(query.hit());
        assert!((query.distance - 4.0).abs() < 1e-4);

        let touch = prepared.interact(&query);
        assert!((touch.point.z + 4.0).abs() < 1e-4);
        assert!((touch.geometric_normal - Vec3A::Z).length() < 1e-4);
        assert!(!touch.material.is_emissive());

        assert_eq!(prepared.counters().traces(), 1);
    }

    #[test]
    fn test_bvh_matches_reference_on_scene() {
        let prepared = PreparedScene::prepare(&basic_scene(), &PrepareOptions::default()).unwrap();
        let mut rng = crate::rng::Pcg32::new(5, 5);

        for _ in 0..50 {
            let dir = crate::sampling::uniform_sample_sphere(Sample2::new(
                rng.next_f32(),
                rng.next_f32(),
            ));
            let ray = Ray::new(Vec3A::ZERO, dir);

            let mut fast = TraceQuery::new(ray);
            prepared.trace(&mut fast);
            let mut slow = TraceQuery::new(ray);
            prepared.trace_reference(&mut slow);

            assert_eq!(fast.hit(), slow.hit());
            if fast.hit() {
                assert!((fast.distance - slow.distance).abs() < 1e-5);
            }
        }
    }
}
