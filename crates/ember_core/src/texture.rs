//! Texture storage and loading.
//!
//! Textures are 2D grids of linear float4 texels with a wrap policy,
//! loaded from disk through a cache or built procedurally. Sampling is
//! bilinear; all pixel data is linear RGB(A).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ember_math::{Vec2, Vec4};
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to load texture: {0}")]
    LoadError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// How texcoords outside [0, 1] are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WrapMode {
    /// Tile the texture
    #[default]
    Repeat,

    /// Clamp to the edge texel
    Clamp,
}

/// A 2D grid of linear float4 texels.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Texture width in pixels
    width: u32,

    /// Texture height in pixels
    height: u32,

    /// Texel data, row-major, linear
    texels: Vec<Vec4>,

    /// Wrap policy for out-of-range texcoords
    wrap: WrapMode,
}

impl Texture {
    /// Create a new texture from texel data.
    pub fn new(width: u32, height: u32, texels: Vec<Vec4>, wrap: WrapMode) -> Self {
        debug_assert_eq!((width * height) as usize, texels.len());
        Self {
            width,
            height,
            texels,
            wrap,
        }
    }

    /// Create a solid color texture (1x1).
    pub fn solid(color: Vec4) -> Self {
        Self {
            width: 1,
            height: 1,
            texels: vec![color],
            wrap: WrapMode::Repeat,
        }
    }

    /// Create an n-by-n two-color checkerboard.
    pub fn checkerboard(a: Vec4, b: Vec4, cells: u32) -> Self {
        let cells = cells.max(1);
        let texels = (0..cells * cells)
            .map(|i| {
                let (x, y) = (i % cells, i / cells);
                if (x + y) % 2 == 0 {
                    a
                } else {
                    b
                }
            })
            .collect();
        Self {
            width: cells,
            height: cells,
            texels,
            wrap: WrapMode::Repeat,
        }
    }

    /// Texture dimensions in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sample the texture at a texcoord with bilinear filtering.
    pub fn sample_2d(&self, uv: Vec2) -> Vec4 {
        let u = self.wrap_coord(uv.x);
        let v = self.wrap_coord(uv.y);

        // Convert to texel coordinates; V is flipped for image layout
        let x = u * (self.width as f32 - 1.0);
        let y = (1.0 - v) * (self.height as f32 - 1.0);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = x.fract();
        let fy = y.fract();

        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), fx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    /// Mean texel value.
    pub fn average(&self) -> Vec4 {
        if self.texels.is_empty() {
            return Vec4::ZERO;
        }
        let sum: Vec4 = self.texels.iter().copied().sum();
        sum / self.texels.len() as f32
    }

    /// Raw texel at integer coordinates (no wrap).
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let idx = (y * self.width + x) as usize;
        self.texels.get(idx).copied().unwrap_or(Vec4::W)
    }

    fn wrap_coord(&self, c: f32) -> f32 {
        match self.wrap {
            WrapMode::Repeat => c.rem_euclid(1.0),
            WrapMode::Clamp => c.clamp(0.0, 1.0),
        }
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.texels.len() * std::mem::size_of::<Vec4>()
    }
}

/// Cache for loaded textures.
///
/// Textures are loaded on-demand and cached for reuse.
pub struct TextureCache {
    /// Cached textures by file path
    textures: HashMap<String, Arc<Texture>>,

    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    /// Create a new empty texture cache.
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: None,
        }
    }

    /// Create a texture cache with a base directory for relative paths.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load a texture from file, using cache if available.
    pub fn load(&mut self, path: &str, wrap: WrapMode) -> TextureResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let full_path = self.resolve_path(path);
        let texture = Arc::new(load_texture_file(&full_path, wrap)?);
        self.textures.insert(path.to_string(), texture.clone());

        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            path,
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );

        Ok(texture)
    }

    /// Get a cached texture without loading.
    pub fn get(&self, path: &str) -> Option<Arc<Texture>> {
        self.textures.get(path).cloned()
    }

    /// Get the number of cached textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Clear all cached textures.
    pub fn clear(&mut self) {
        self.textures.clear();
    }

    /// Resolve a path relative to the base directory.
    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);

        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(base) = &self.base_dir {
            base.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a texture from a file path.
fn load_texture_file(path: &Path, wrap: WrapMode) -> TextureResult<Texture> {
    let img = image::open(path).map_err(|e| {
        TextureError::LoadError(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    // Convert to linear float RGBA
    let texels: Vec<Vec4> = rgba
        .pixels()
        .map(|p| {
            Vec4::new(
                srgb_to_linear(p[0]),
                srgb_to_linear(p[1]),
                srgb_to_linear(p[2]),
                p[3] as f32 / 255.0, // Alpha is linear
            )
        })
        .collect();

    Ok(Texture::new(width, height, texels, wrap))
}

/// Convert sRGB byte value to linear float.
fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}
