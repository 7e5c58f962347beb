//! Pseudo-random number generation and sample streams.
//!
//! Two generators: a hash-based avalanche used for seeding (reproducible
//! regardless of scheduling order) and a PCG32 linear generator for the
//! per-sample stream. Both plug into the `rand` traits so they compose
//! with the rest of the ecosystem.

use rand::{RngCore, SeedableRng};

/// SplitMix64 avalanche. Decorrelates consecutive integers into
/// well-distributed 64-bit values.
#[inline]
pub fn hash_mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Deterministic seed for one pixel sample. Independent of tile
/// assignment and worker scheduling.
#[inline]
pub fn sample_seed(global_seed: u64, pixel_index: u64, sample_index: u32) -> u64 {
    hash_mix(global_seed ^ hash_mix(pixel_index ^ hash_mix(sample_index as u64)))
}

/// PCG32: 64-bit state linear congruential core with an output
/// permutation (O'Neill 2014).
#[derive(Debug, Clone)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

const PCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;

impl Pcg32 {
    /// Create a generator from a seed and stream selector.
    pub fn new(seed: u64, stream: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (stream << 1) | 1,
        };
        rng.next_u32();
        rng.state = rng.state.wrapping_add(seed);
        rng.next_u32();
        rng
    }

    /// Uniform f32 in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        // 24 mantissa bits; same construction as rand's Standard f32
        (self.next_u32() >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
    }
}

impl RngCore for Pcg32 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = old.wrapping_mul(PCG_MULTIPLIER).wrapping_add(self.inc);
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let lo = self.next_u32() as u64;
        let hi = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Pcg32 {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        let state = u64::from_le_bytes(seed[..8].try_into().unwrap());
        let stream = u64::from_le_bytes(seed[8..].try_into().unwrap());
        Self::new(state, stream)
    }

    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed, hash_mix(seed))
    }
}

/// A single 1D sample.
#[derive(Debug, Clone, Copy)]
pub struct Sample1(pub f32);

/// A single 2D sample.
#[derive(Debug, Clone, Copy)]
pub struct Sample2 {
    pub x: f32,
    pub y: f32,
}

impl Sample2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Reversed-bit radical inverse in base 2.
#[inline]
fn radical_inverse_base2(mut n: u32) -> f32 {
    n = n.reverse_bits();
    n as f32 * (1.0 / 4_294_967_296.0)
}

/// Radical inverse in base 3.
fn radical_inverse_base3(mut n: u32) -> f32 {
    let mut inv = 0.0f32;
    let mut base_r = 1.0f32 / 3.0;
    while n > 0 {
        inv += (n % 3) as f32 * base_r;
        n /= 3;
        base_r /= 3.0;
    }
    inv
}

/// Deterministic per-pixel-sample stream of 1D and 2D samples.
///
/// The first 2D draw (used for the camera jitter) is a Halton (2,3)
/// point with a per-pixel Cranley-Patterson rotation, so samples within
/// a pixel stratify across the footprint. Subsequent draws come from
/// the PCG stream.
pub struct Sampler {
    rng: Pcg32,
    sample_index: u32,
    rotation: Sample2,
    first_2d: bool,
}

impl Sampler {
    /// Create the stream for one pixel sample.
    pub fn for_pixel_sample(global_seed: u64, pixel_index: u64, sample_index: u32) -> Self {
        let mut rng = Pcg32::new(
            sample_seed(global_seed, pixel_index, sample_index),
            hash_mix(pixel_index),
        );
        // Rotation depends on the pixel only, so the Halton points of
        // successive samples stay stratified relative to each other.
        let mut pixel_rng = Pcg32::new(hash_mix(global_seed ^ pixel_index), 0);
        let rotation = Sample2::new(pixel_rng.next_f32(), pixel_rng.next_f32());

        Self {
            rng,
            sample_index,
            rotation,
            first_2d: true,
        }
    }

    /// Next 1D sample in [0, 1).
    #[inline]
    pub fn next_1d(&mut self) -> Sample1 {
        Sample1(self.rng.next_f32())
    }

    /// Next 2D sample in [0, 1)^2.
    #[inline]
    pub fn next_2d(&mut self) -> Sample2 {
        if self.first_2d {
            self.first_2d = false;
            let x = radical_inverse_base2(self.sample_index) + self.rotation.x;
            let y = radical_inverse_base3(self.sample_index) + self.rotation.y;
            return Sample2::new(x.fract(), y.fract());
        }
        Sample2::new(self.rng.next_f32(), self.rng.next_f32())
    }
}
