//! Render a small demo scene to a PNG.
//!
//! Run with: cargo run --release --example render_scene

use std::sync::Arc;

use ember_core::{
    CameraSettings, Entity, EnvironmentSource, LightSource, Payload, Scene, Shape,
    SurfaceMaterial, Texture, Transform,
};
use ember_math::{Quat, Vec3, Vec3A, Vec4};
use ember_renderer::{Engine, EngineState, PrepareOptions, PreparedScene, RenderProfile};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn build_scene() -> Scene {
    let mut scene = Scene::new("demo");

    scene.add(
        Entity::with_payload(
            "camera",
            Payload::Camera(CameraSettings {
                fov_y: 50.0,
                ..Default::default()
            }),
        )
        .at(Transform::from_translation(Vec3::new(0.0, 1.5, 4.0))),
    );

    scene.add(Entity::with_payload(
        "sky",
        Payload::Light(LightSource::Ambient(EnvironmentSource::Gradient {
            zenith: Vec3A::new(0.35, 0.55, 0.9),
            horizon: Vec3A::new(0.9, 0.9, 0.95),
        })),
    ));

    // Checkered floor
    let checker = Arc::new(Texture::checkerboard(
        Vec4::new(0.85, 0.85, 0.85, 1.0),
        Vec4::new(0.15, 0.15, 0.18, 1.0),
        16,
    ));
    scene.add(
        Entity::with_payload(
            "floor",
            Payload::Shape {
                shape: Shape::Quad {
                    width: 20.0,
                    height: 20.0,
                },
                material: Arc::new(
                    SurfaceMaterial::diffuse("floor", Vec3A::ONE).with_albedo_texture(checker),
                ),
            },
        )
        .at(Transform {
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            ..Default::default()
        }),
    );

    scene.add(
        Entity::with_payload(
            "matte",
            Payload::Shape {
                shape: Shape::Sphere { radius: 1.0 },
                material: Arc::new(SurfaceMaterial::diffuse(
                    "matte",
                    Vec3A::new(0.7, 0.25, 0.2),
                )),
            },
        )
        .at(Transform::from_translation(Vec3::new(-2.2, 1.0, 0.0))),
    );

    scene.add(
        Entity::with_payload(
            "mirror",
            Payload::Shape {
                shape: Shape::Sphere { radius: 1.0 },
                material: Arc::new(SurfaceMaterial::mirror("mirror", Vec3A::splat(0.95))),
            },
        )
        .at(Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
    );

    scene.add(
        Entity::with_payload(
            "glass",
            Payload::Shape {
                shape: Shape::Sphere { radius: 1.0 },
                material: Arc::new(SurfaceMaterial::glass("glass", 1.5)),
            },
        )
        .at(Transform::from_translation(Vec3::new(2.2, 1.0, 0.0))),
    );

    scene.add(
        Entity::with_payload(
            "lamp",
            Payload::Shape {
                shape: Shape::Quad {
                    width: 2.0,
                    height: 2.0,
                },
                material: Arc::new(SurfaceMaterial::emissive("lamp", Vec3A::splat(6.0))),
            },
        )
        .at(Transform {
            translation: Vec3::new(0.0, 5.0, 1.0),
            rotation: Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
            scale: Vec3::ONE,
        }),
    );

    scene
}

fn main() {
    env_logger::init();

    let scene = build_scene();
    let options = PrepareOptions {
        resolution: (WIDTH, HEIGHT),
        ..Default::default()
    };
    let prepared = Arc::new(PreparedScene::prepare(&scene, &options).expect("valid scene"));

    let mut engine = Engine::new(prepared, WIDTH, HEIGHT).expect("valid buffer");
    let profile = RenderProfile {
        base_sample: 32,
        adaptive_sample: 128,
        bounce_limit: 8,
        ..Default::default()
    };
    engine.begin(profile).expect("begin render");

    let state = engine.wait();
    assert_eq!(state, EngineState::Completed);

    let progress = engine.progress();
    println!(
        "Rendered {} pixels, {} samples, {} rays traced",
        progress.pixels, progress.samples, progress.traces
    );

    let image = engine.image();
    let rgba = image.to_rgba8();
    image::save_buffer(
        "render_scene.png",
        &rgba,
        WIDTH,
        HEIGHT,
        image::ColorType::Rgba8,
    )
    .expect("write PNG");
    println!("Wrote render_scene.png");
}
