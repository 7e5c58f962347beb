//! Sampling distributions and warps.
//!
//! Piecewise-constant 1D/2D distributions drive light selection and
//! environment importance sampling; the warps map unit-square samples
//! onto the shapes the integrator needs.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use ember_math::{safe_sqrt, Vec2, Vec3A};

use crate::rng::Sample2;

/// A piecewise-constant distribution over [0, 1].
#[derive(Debug, Clone)]
pub struct Distribution1D {
    func: Vec<f32>,
    cdf: Vec<f32>,
    func_int: f32,
}

impl Distribution1D {
    /// Build from unnormalized non-negative weights.
    pub fn new(func: &[f32]) -> Self {
        let n = func.len().max(1);
        let func: Vec<f32> = if func.is_empty() {
            vec![0.0]
        } else {
            func.iter().map(|f| f.max(0.0)).collect()
        };

        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        for (i, f) in func.iter().enumerate() {
            cdf.push(cdf[i] + f / n as f32);
        }

        let func_int = cdf[n];
        if func_int == 0.0 {
            // Degenerate input: fall back to uniform
            for (i, c) in cdf.iter_mut().enumerate() {
                *c = i as f32 / n as f32;
            }
        } else {
            for c in cdf.iter_mut() {
                *c /= func_int;
            }
        }

        Self {
            func,
            cdf,
            func_int,
        }
    }

    /// Number of pieces.
    pub fn count(&self) -> usize {
        self.func.len()
    }

    /// Integral of the unnormalized function.
    pub fn integral(&self) -> f32 {
        self.func_int
    }

    fn offset(&self, u: f32) -> usize {
        // Index of the last CDF entry <= u
        self.cdf
            .partition_point(|&c| c <= u)
            .saturating_sub(1)
            .min(self.func.len() - 1)
    }

    /// Sample a piece index. Returns (index, pmf).
    pub fn sample_discrete(&self, u: f32) -> (usize, f32) {
        let offset = self.offset(u);
        (offset, self.discrete_pdf(offset))
    }

    /// Probability mass of a piece.
    pub fn discrete_pdf(&self, index: usize) -> f32 {
        if self.func_int == 0.0 {
            return 1.0 / self.func.len() as f32;
        }
        self.func[index] / (self.func_int * self.func.len() as f32)
    }

    /// Sample a continuous coordinate in [0, 1]. Returns (x, pdf, index).
    pub fn sample_continuous(&self, u: f32) -> (f32, f32, usize) {
        let offset = self.offset(u);
        let d_cdf = self.cdf[offset + 1] - self.cdf[offset];
        let du = if d_cdf > 0.0 {
            (u - self.cdf[offset]) / d_cdf
        } else {
            0.0
        };

        let pdf = if self.func_int > 0.0 {
            self.func[offset] / self.func_int
        } else {
            1.0
        };
        let x = (offset as f32 + du) / self.count() as f32;
        (x, pdf, offset)
    }

    /// Density at a continuous coordinate.
    pub fn pdf(&self, x: f32) -> f32 {
        if self.func_int == 0.0 {
            return 1.0;
        }
        let index = ((x * self.count() as f32) as usize).min(self.count() - 1);
        self.func[index] / self.func_int
    }
}

/// A piecewise-constant distribution over the unit square, as a marginal
/// over rows and a conditional per row.
#[derive(Debug, Clone)]
pub struct Distribution2D {
    conditional: Vec<Distribution1D>,
    marginal: Distribution1D,
}

impl Distribution2D {
    /// Build from a row-major grid of unnormalized weights.
    pub fn new(func: &[f32], width: usize, height: usize) -> Self {
        assert_eq!(func.len(), width * height);
        let conditional: Vec<Distribution1D> = (0..height)
            .map(|y| Distribution1D::new(&func[y * width..(y + 1) * width]))
            .collect();
        let marginal_func: Vec<f32> = conditional.iter().map(|c| c.integral()).collect();
        let marginal = Distribution1D::new(&marginal_func);

        Self {
            conditional,
            marginal,
        }
    }

    /// Sample a (u, v) point. Returns (point, pdf).
    pub fn sample_continuous(&self, u: Sample2) -> (Vec2, f32) {
        let (v, pdf_v, row) = self.marginal.sample_continuous(u.y);
        let (x, pdf_x, _) = self.conditional[row].sample_continuous(u.x);
        (Vec2::new(x, v), pdf_x * pdf_v)
    }

    /// Density at a (u, v) point.
    pub fn pdf(&self, uv: Vec2) -> f32 {
        let row = ((uv.y * self.conditional.len() as f32) as usize)
            .min(self.conditional.len() - 1);
        self.marginal.pdf(uv.y) * self.conditional[row].pdf(uv.x)
    }
}

// =============================================================================
// Warps
// =============================================================================

/// Map a unit-square sample onto the unit disk (Shirley-Chiu concentric).
pub fn concentric_sample_disk(u: Sample2) -> Vec2 {
    let offset = Vec2::new(2.0 * u.x - 1.0, 2.0 * u.y - 1.0);
    if offset.x == 0.0 && offset.y == 0.0 {
        return Vec2::ZERO;
    }

    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (offset.y, FRAC_PI_2 - FRAC_PI_4 * (offset.x / offset.y))
    };
    r * Vec2::new(theta.cos(), theta.sin())
}

/// Cosine-weighted hemisphere around +Z (Malley's method).
pub fn cosine_sample_hemisphere(u: Sample2) -> Vec3A {
    let d = concentric_sample_disk(u);
    let z = safe_sqrt(1.0 - d.x * d.x - d.y * d.y);
    Vec3A::new(d.x, d.y, z)
}

/// Density of [`cosine_sample_hemisphere`].
#[inline]
pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta.max(0.0) / PI
}

/// Uniform direction on the unit sphere.
pub fn uniform_sample_sphere(u: Sample2) -> Vec3A {
    let z = 1.0 - 2.0 * u.x;
    let r = safe_sqrt(1.0 - z * z);
    let phi = 2.0 * PI * u.y;
    Vec3A::new(r * phi.cos(), r * phi.sin(), z)
}

/// Density of [`uniform_sample_sphere`].
#[inline]
pub fn uniform_sphere_pdf() -> f32 {
    1.0 / (4.0 * PI)
}

/// Uniform barycentrics over a triangle.
pub fn uniform_sample_triangle(u: Sample2) -> Vec2 {
    let su0 = safe_sqrt(u.x);
    Vec2::new(1.0 - su0, u.y * su0)
}

/// Power heuristic (beta = 2) for combining two sampling strategies.
#[inline]
pub fn power_heuristic(nf: f32, f_pdf: f32, ng: f32, g_pdf: f32) -> f32 {
    let f = nf * f_pdf;
    let g = ng * g_pdf;
    if f == 0.0 && g == 0.0 {
        return 0.0;
    }
    (f * f) / (f * f + g * g)
}
