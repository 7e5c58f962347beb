//! Surface interaction packet.

use ember_math::{Vec2, Vec3A};

use crate::material::PressedMaterial;
use crate::token::Token;

/// Everything the shading path needs about one hit point.
///
/// Produced by `PreparedScene::interact` from a completed trace query;
/// the shading normal already includes normal mapping.
#[derive(Clone, Copy)]
pub struct Interaction<'a> {
    /// World-space hit point
    pub point: Vec3A,

    /// Unit geometric normal
    pub geometric_normal: Vec3A,

    /// Unit shading normal (interpolated + normal-mapped)
    pub shading_normal: Vec3A,

    /// Unit direction back toward the ray origin
    pub outgoing: Vec3A,

    /// Texture coordinates at the hit
    pub texcoord: Vec2,

    /// Material at the hit point
    pub material: &'a PressedMaterial,

    /// Primitive that was hit
    pub token: Token,
}
