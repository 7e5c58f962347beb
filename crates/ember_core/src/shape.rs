//! Renderable shapes and their primitive extraction.
//!
//! Shapes produce world-space raw primitives during scene preparation.
//! Raw primitives carry everything the renderer needs to press them into
//! its compact prepared layout: positions, texcoords, optional shading
//! normals, and the pressed material index.

use ember_math::{Mat4, Mat4Ext, Vec2, Vec3, Vec3A};

/// A world-space triangle produced by shape extraction.
#[derive(Clone, Debug)]
pub struct RawTriangle {
    /// Vertex positions
    pub positions: [Vec3A; 3],

    /// Per-vertex texture coordinates
    pub texcoords: [Vec2; 3],

    /// Per-vertex shading normals (None = flat shading)
    pub normals: Option<[Vec3A; 3]>,

    /// Pressed material index
    pub material: u32,
}

/// A world-space sphere produced by shape extraction.
#[derive(Clone, Copy, Debug)]
pub struct RawSphere {
    pub center: Vec3A,
    pub radius: f32,

    /// Pressed material index
    pub material: u32,
}

/// A mesh consisting of vertex positions, optional normals and UVs, and
/// triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional - will be computed if not provided)
    pub normals: Option<Vec<Vec3>>,

    /// UV coordinates (optional - one [u, v] per vertex)
    pub uvs: Option<Vec<[f32; 2]>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    ///
    /// If normals are not provided, they will NOT be automatically computed.
    /// Call `compute_normals()` explicitly if you need them.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        Self {
            positions,
            normals,
            uvs: None,
            indices,
        }
    }

    /// Create a new mesh with UV coordinates.
    pub fn new_with_uvs(
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        normals: Option<Vec<Vec3>>,
        uvs: Option<Vec<[f32; 2]>>,
    ) -> Self {
        Self {
            positions,
            normals,
            uvs,
            indices,
        }
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Compute smooth vertex normals by averaging face normals.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        // Accumulate face normals at each vertex
        for face in self.indices.chunks(3) {
            if face.len() < 3 {
                continue;
            }

            let i0 = face[0] as usize;
            let i1 = face[1] as usize;
            let i2 = face[2] as usize;

            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let p1 = self.positions[i1];
            let p2 = self.positions[i2];

            let face_normal = (p1 - p0).cross(p2 - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        // Normalize accumulated normals
        for normal in &mut normals {
            let len = normal.length();
            if len > 0.0 {
                *normal /= len;
            } else {
                *normal = Vec3::Y;
            }
        }

        self.normals = Some(normals);
    }
}

/// A renderable shape attached to an entity.
#[derive(Clone, Debug)]
pub enum Shape {
    /// Triangle mesh
    Mesh(Mesh),

    /// Sphere of the given radius centered at the entity origin.
    /// Expects a uniform entity scale; the largest scale component wins.
    Sphere { radius: f32 },

    /// Planar quad in the local XY plane, centered at the origin, facing
    /// local +Z, with UVs spanning [0,1]^2.
    Quad { width: f32, height: f32 },
}

impl Shape {
    /// Extract world-space triangles, tagged with the pressed material index.
    pub fn triangles(&self, world: &Mat4, material: u32) -> Vec<RawTriangle> {
        match self {
            Shape::Mesh(mesh) => mesh_triangles(mesh, world, material),
            Shape::Sphere { .. } => Vec::new(),
            Shape::Quad { width, height } => quad_triangles(*width, *height, world, material),
        }
    }

    /// Extract world-space spheres, tagged with the pressed material index.
    pub fn spheres(&self, world: &Mat4, material: u32) -> Vec<RawSphere> {
        match self {
            Shape::Sphere { radius } => {
                let (scale, _, _) = world.to_scale_rotation_translation();
                vec![RawSphere {
                    center: world.transform_point3a(Vec3A::ZERO),
                    radius: radius * scale.max_element(),
                    material,
                }]
            }
            _ => Vec::new(),
        }
    }
}

fn mesh_triangles(mesh: &Mesh, world: &Mat4, material: u32) -> Vec<RawTriangle> {
    let mut out = Vec::with_capacity(mesh.triangle_count());

    for face in mesh.indices.chunks_exact(3) {
        let idx = [face[0] as usize, face[1] as usize, face[2] as usize];
        if idx.iter().any(|&i| i >= mesh.positions.len()) {
            continue;
        }

        let positions =
            idx.map(|i| world.transform_point3a(Vec3A::from(mesh.positions[i])));

        let texcoords = match &mesh.uvs {
            Some(uvs) => idx.map(|i| Vec2::from(uvs[i])),
            None => [Vec2::ZERO; 3],
        };

        let normals = mesh
            .normals
            .as_ref()
            .map(|normals| idx.map(|i| world.transform_normal(Vec3A::from(normals[i]))));

        out.push(RawTriangle {
            positions,
            texcoords,
            normals,
            material,
        });
    }

    out
}

/// A quad is pressed as two triangles sharing the diagonal.
fn quad_triangles(width: f32, height: f32, world: &Mat4, material: u32) -> Vec<RawTriangle> {
    let hw = width * 0.5;
    let hh = height * 0.5;

    let corners = [
        world.transform_point3a(Vec3A::new(-hw, -hh, 0.0)),
        world.transform_point3a(Vec3A::new(hw, -hh, 0.0)),
        world.transform_point3a(Vec3A::new(hw, hh, 0.0)),
        world.transform_point3a(Vec3A::new(-hw, hh, 0.0)),
    ];
    let uvs = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];
    let normal = world.transform_normal(Vec3A::Z);

    vec![
        RawTriangle {
            positions: [corners[0], corners[1], corners[2]],
            texcoords: [uvs[0], uvs[1], uvs[2]],
            normals: Some([normal; 3]),
            material,
        },
        RawTriangle {
            positions: [corners[0], corners[2], corners[3]],
            texcoords: [uvs[0], uvs[2], uvs[3]],
            normals: Some([normal; 3]),
            material,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_math::Mat4;

    #[test]
    fn test_mesh_compute_normals() {
        let mut mesh = Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
            None,
        );
        mesh.compute_normals();

        let normals = mesh.normals.as_ref().unwrap();
        for n in normals {
            assert!((n.length() - 1.0).abs() < 1e-5);
            assert!((*n - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_quad_extracts_two_triangles() {
        let shape = Shape::Quad {
            width: 2.0,
            height: 2.0,
        };
        let tris = shape.triangles(&Mat4::IDENTITY, 7);

        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0].material, 7);

        // Corner UVs span the unit square
        assert_eq!(tris[0].texcoords[0], Vec2::new(0.0, 0.0));
        assert_eq!(tris[1].texcoords[2], Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_sphere_extraction_applies_transform() {
        let shape = Shape::Sphere { radius: 2.0 };
        let world = Mat4::from_scale_rotation_translation(
            Vec3::splat(3.0),
            ember_math::Quat::IDENTITY,
            Vec3::new(1.0, 2.0, 3.0),
        );

        let spheres = shape.spheres(&world, 0);
        assert_eq!(spheres.len(), 1);
        assert!((spheres[0].radius - 6.0).abs() < 1e-5);
        assert!((spheres[0].center - Vec3A::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_mesh_triangles_world_space() {
        let mesh = Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
            None,
        );
        let world = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let tris = Shape::Mesh(mesh).triangles(&world, 0);

        assert_eq!(tris.len(), 1);
        assert!((tris[0].positions[0].z - 5.0).abs() < 1e-6);
        assert!(tris[0].normals.is_none());
    }
}
