//! Accumulating render buffer.

use ember_math::{Vec2, Vec4};

use crate::error::{RenderError, RenderResult};

/// One pixel's accumulated samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelAccumulator {
    /// Weighted radiance sum (alpha accumulates at weight)
    pub radiance: Vec4,

    /// Sum of sample weights
    pub weight: f32,

    /// Number of samples taken
    pub count: u32,
}

impl PixelAccumulator {
    /// Fold one sample in.
    #[inline]
    pub fn add(&mut self, value: Vec4, weight: f32) {
        self.radiance += value * weight;
        self.weight += weight;
        self.count += 1;
    }

    /// Fold another accumulator in.
    #[inline]
    pub fn merge(&mut self, other: &PixelAccumulator) {
        self.radiance += other.radiance;
        self.weight += other.weight;
        self.count += other.count;
    }

    /// Weighted mean of the accumulated samples.
    pub fn mean(&self) -> Vec4 {
        if self.weight > 0.0 {
            self.radiance / self.weight
        } else {
            Vec4::ZERO
        }
    }
}

/// A 2D grid of accumulating pixels.
///
/// Thread safety comes from the scheduler's tile discipline: exactly
/// one worker owns any pixel at a time, and results become visible to
/// other threads when the render completes.
#[derive(Clone)]
pub struct RenderBuffer {
    width: u32,
    height: u32,
    pixels: Vec<PixelAccumulator>,

    /// Reciprocal of the size in pixels
    size_r: Vec2,

    /// Size over the smaller dimension
    aspects: Vec2,
}

impl RenderBuffer {
    /// Allocate a cleared buffer.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidBuffer(format!(
                "buffer size {width}x{height} has a zero dimension"
            )));
        }

        let min_side = width.min(height) as f32;
        Ok(Self {
            width,
            height,
            pixels: vec![PixelAccumulator::default(); (width * height) as usize],
            size_r: Vec2::new(1.0 / width as f32, 1.0 / height as f32),
            aspects: Vec2::new(width as f32 / min_side, height as f32 / min_side),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reciprocal size, for pixel-to-NDC mapping.
    pub fn size_r(&self) -> Vec2 {
        self.size_r
    }

    /// Aspect factors relative to the smaller dimension.
    pub fn aspects(&self) -> Vec2 {
        self.aspects
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y * self.width + x) as usize
    }

    /// Add a sample to a pixel.
    pub fn add_sample(&mut self, x: u32, y: u32, value: Vec4, weight: f32) {
        let index = self.index(x, y);
        self.pixels[index].add(value, weight);
    }

    /// Merge a worker-local tile of accumulators, row-major within the
    /// tile rectangle.
    pub fn merge_tile(&mut self, origin: (u32, u32), size: (u32, u32), tile: &[PixelAccumulator]) {
        debug_assert_eq!(tile.len(), (size.0 * size.1) as usize);
        for row in 0..size.1 {
            let src = (row * size.0) as usize;
            let dst = self.index(origin.0, origin.1 + row);
            for col in 0..size.0 as usize {
                self.pixels[dst + col].merge(&tile[src + col]);
            }
        }
    }

    /// Pixel accumulator at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> &PixelAccumulator {
        &self.pixels[self.index(x, y)]
    }

    /// Mean radiance at (x, y).
    pub fn mean(&self, x: u32, y: u32) -> Vec4 {
        self.pixel(x, y).mean()
    }

    /// Total samples across all pixels.
    pub fn total_samples(&self) -> u64 {
        self.pixels.iter().map(|p| p.count as u64).sum()
    }

    /// Reset all pixels to empty.
    pub fn clear(&mut self) {
        for pixel in &mut self.pixels {
            *pixel = PixelAccumulator::default();
        }
    }

    /// Convert to 8-bit RGBA with gamma 2.0, for previews.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            let mean = pixel.mean();
            for channel in [mean.x, mean.y, mean.z] {
                let gamma = channel.max(0.0).sqrt().clamp(0.0, 1.0);
                bytes.push((gamma * 255.0 + 0.5) as u8);
            }
            bytes.push(255);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            RenderBuffer::new(0, 10),
            Err(RenderError::InvalidBuffer(_))
        ));
        assert!(matches!(
            RenderBuffer::new(10, 0),
            Err(RenderError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_accumulation_mean() {
        let mut buffer = RenderBuffer::new(4, 4).unwrap();
        buffer.add_sample(1, 2, Vec4::new(1.0, 0.0, 0.0, 1.0), 1.0);
        buffer.add_sample(1, 2, Vec4::new(0.0, 1.0, 0.0, 1.0), 1.0);

        let mean = buffer.mean(1, 2);
        assert!((mean.x - 0.5).abs() < 1e-6);
        assert!((mean.y - 0.5).abs() < 1e-6);
        assert!((mean.w - 1.0).abs() < 1e-6);
        assert_eq!(buffer.pixel(1, 2).count, 2);
        assert_eq!(buffer.total_samples(), 2);
    }

    #[test]
    fn test_size_metrics() {
        let buffer = RenderBuffer::new(200, 100).unwrap();
        assert!((buffer.size_r().x - 0.005).abs() < 1e-7);
        assert!((buffer.aspects().x - 2.0).abs() < 1e-6);
        assert!((buffer.aspects().y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_merge_tile() {
        let mut buffer = RenderBuffer::new(8, 8).unwrap();
        let mut tile = vec![PixelAccumulator::default(); 4];
        tile[0].add(Vec4::ONE, 1.0);
        tile[3].add(Vec4::splat(2.0), 1.0);

        buffer.merge_tile((2, 4), (2, 2), &tile);

        assert_eq!(buffer.pixel(2, 4).count, 1);
        assert!((buffer.mean(2, 4).x - 1.0).abs() < 1e-6);
        assert_eq!(buffer.pixel(3, 5).count, 1);
        assert!((buffer.mean(3, 5).x - 2.0).abs() < 1e-6);
        assert_eq!(buffer.pixel(2, 5).count, 0);
    }

    #[test]
    fn test_clear() {
        let mut buffer = RenderBuffer::new(2, 2).unwrap();
        buffer.add_sample(0, 0, Vec4::ONE, 1.0);
        buffer.clear();
        assert_eq!(buffer.total_samples(), 0);
    }
}
