//! Ember Core - source scene model
//!
//! The mutable, hierarchical scene description that the renderer presses
//! into its immutable prepared form. Holds entities, shapes, authored
//! materials, light and camera descriptions, and texture storage.

mod light;
mod material;
mod scene;
mod shape;
mod texture;

pub use light::{EnvironmentSource, LightSource};
pub use material::{SurfaceMaterial, TextureSource};
pub use scene::{CameraSettings, Entity, Payload, Scene, Transform};
pub use shape::{Mesh, RawSphere, RawTriangle, Shape};
pub use texture::{Texture, TextureCache, TextureError, TextureResult, WrapMode};
