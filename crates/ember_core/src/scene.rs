//! Scene graph types for ember.
//!
//! The source scene is a mutable tree of entities, each with a local TRS
//! transform and an optional payload (camera, light, shape). The renderer
//! flattens this tree once into its immutable prepared form; afterwards
//! the tree is no longer consulted.

use std::sync::Arc;

use ember_math::{Mat4, Quat, Vec3};

use crate::light::LightSource;
use crate::material::SurfaceMaterial;
use crate::shape::Shape;

/// Transform components that can be composed into a matrix.
#[derive(Clone, Debug)]
pub struct Transform {
    /// Translation
    pub translation: Vec3,

    /// Rotation (as versor)
    pub rotation: Quat,

    /// Scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a new transform from a 4x4 matrix.
    ///
    /// Decomposes the matrix into translation, rotation, and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Camera projection settings. The pose comes from the owning entity's
/// transform: the camera looks along its local -Z with +Y up.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    /// Vertical field of view in degrees
    pub fov_y: f32,

    /// Thin-lens aperture radius; 0 disables defocus
    pub lens_radius: f32,

    /// Distance to the plane of perfect focus
    pub focus_distance: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y: 60.0,
            lens_radius: 0.0,
            focus_distance: 1.0,
        }
    }
}

/// What an entity contributes to the scene.
#[derive(Clone, Debug)]
pub enum Payload {
    /// Pure grouping node
    Group,

    /// Camera (first one found wins)
    Camera(CameraSettings),

    /// Light source
    Light(LightSource),

    /// Renderable shape with its material
    Shape {
        shape: Shape,
        material: Arc<SurfaceMaterial>,
    },
}

/// A node in the scene tree.
#[derive(Clone, Debug)]
pub struct Entity {
    /// Entity name (for logs and debugging)
    pub name: String,

    /// Local transform relative to the parent
    pub transform: Transform,

    /// Child entities
    pub children: Vec<Entity>,

    /// What this entity contributes
    pub payload: Payload,
}

impl Entity {
    /// Create an empty grouping entity.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            children: Vec::new(),
            payload: Payload::Group,
        }
    }

    /// Create an entity with a payload.
    pub fn with_payload(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            children: Vec::new(),
            payload,
        }
    }

    /// Set the local transform.
    pub fn at(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Add a child entity.
    pub fn add_child(&mut self, child: Entity) -> &mut Entity {
        self.children.push(child);
        self.children.last_mut().unwrap()
    }
}

/// A complete source scene: a tree of entities.
#[derive(Clone, Debug)]
pub struct Scene {
    /// Root of the entity tree
    pub root: Entity,

    /// Scene name (usually from filename)
    pub name: String,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            root: Entity::group(name.clone()),
            name,
        }
    }

    /// Add a top-level entity and return a mutable reference to it.
    pub fn add(&mut self, entity: Entity) -> &mut Entity {
        self.root.add_child(entity)
    }

    /// Visit every entity depth-first with its composed world matrix.
    pub fn visit<F: FnMut(&Entity, &Mat4)>(&self, mut f: F) {
        fn walk<F: FnMut(&Entity, &Mat4)>(entity: &Entity, parent: &Mat4, f: &mut F) {
            let world = *parent * entity.transform.to_matrix();
            f(entity, &world);
            for child in &entity.children {
                walk(child, &world, f);
            }
        }
        walk(&self.root, &Mat4::IDENTITY, &mut f);
    }

    /// Count entities carrying a shape payload.
    pub fn shape_count(&self) -> usize {
        let mut count = 0;
        self.visit(|entity, _| {
            if matches!(entity.payload, Payload::Shape { .. }) {
                count += 1;
            }
        });
        count
    }

    /// Count entities carrying a light payload.
    pub fn light_count(&self) -> usize {
        let mut count = 0;
        self.visit(|entity, _| {
            if matches!(entity.payload, Payload::Light(_)) {
                count += 1;
            }
        });
        count
    }
}
