//! 3D Gaussian weighting kernel
//!
//! The kernel is a cube of side `size`. Weight at grid position `(k, j, i)` is
//!
//! `N * exp(-|(k, j, i) - c|^2 / sd^2)`, with `c = (size - 1) / 2` and
//! `N = 1 / (sd^3 * (2*pi)^1.5)`,
//!
//! after which all weights are rescaled to sum to 1.
//!
//! Grid position `k` along an axis maps to the integer neighbour offset
//! `k - size/2`, so odd kernels cover `[-(size-1)/2, (size-1)/2]` and even
//! kernels cover `[-size/2, size/2)`.

use log::debug;

use crate::error::{NeuronError, Result};

/// Sum-normalized cubic Gaussian kernel. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    size: usize,
    standard_deviation: f64,
    /// Indexed `i + j*size + k*size*size` with `k` along z.
    weights: Vec<f64>,
}

impl GaussianKernel {
    /// Build a kernel of side `size` and sigma `standard_deviation`.
    pub fn new(size: usize, standard_deviation: f64) -> Result<Self> {
        if size == 0 {
            return Err(NeuronError::Configuration(
                "kernel size must be >= 1, got 0".to_string(),
            ));
        }
        if !(standard_deviation > 0.0) || !standard_deviation.is_finite() {
            return Err(NeuronError::Configuration(format!(
                "kernel standard deviation must be > 0, got {}",
                standard_deviation
            )));
        }

        let sd2 = standard_deviation * standard_deviation;
        let norm = 1.0 / (standard_deviation.powi(3) * (2.0 * std::f64::consts::PI).powf(1.5));
        let center = (size as f64 - 1.0) / 2.0;

        let mut weights = vec![0.0f64; size * size * size];
        let mut sum = 0.0;
        for k in 0..size {
            let dz = k as f64 - center;
            for j in 0..size {
                let dy = j as f64 - center;
                for i in 0..size {
                    let dx = i as f64 - center;
                    let w = norm * (-(dx * dx + dy * dy + dz * dz) / sd2).exp();
                    weights[i + j * size + k * size * size] = w;
                    sum += w;
                }
            }
        }

        // every tap of an even kernel can underflow when sigma is tiny
        if !(sum > 0.0) || !sum.is_finite() {
            return Err(NeuronError::Configuration(format!(
                "kernel of size {} with sd {} has no representable weight",
                size, standard_deviation
            )));
        }

        for w in weights.iter_mut() {
            *w /= sum;
        }

        debug!(
            "Gaussian kernel size={} sd={} raw_sum={:.6e} peak={:.6}",
            size,
            standard_deviation,
            sum,
            weights.iter().cloned().fold(0.0, f64::max)
        );

        Ok(Self { size, standard_deviation, weights })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn standard_deviation(&self) -> f64 {
        self.standard_deviation
    }

    /// Integer offset subtracted from a grid position to get the neighbour offset.
    #[inline]
    pub fn half(&self) -> usize {
        self.size / 2
    }

    /// Flat weights, `i + j*size + k*size*size`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn weight(&self, k: usize, j: usize, i: usize) -> f64 {
        self.weights[i + j * self.size + k * self.size * self.size]
    }

    /// Copy rescaled so the peak weight is 1.0. For inspection only.
    pub fn max_normalized(&self) -> Vec<f64> {
        let peak = self.weights.iter().cloned().fold(0.0, f64::max);
        if peak <= 0.0 {
            return self.weights.clone();
        }
        self.weights.iter().map(|&w| w / peak).collect()
    }
}
