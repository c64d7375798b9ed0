//! Common test utilities for neuron-core integration tests

#![allow(dead_code)]

use neuron_core::{Dims, Volume};

/// Cube of side `n`, zero everywhere except a single 1.0 voxel at `at` (z, y, x).
pub fn bright_voxel(n: usize, at: (usize, usize, usize)) -> Volume {
    let dims = Dims::new(n, n, n);
    let mut data = vec![0.0; dims.len()];
    data[dims.index(at.0, at.1, at.2)] = 1.0;
    Volume::new(dims, data).unwrap()
}

/// Chebyshev distance between two (z, y, x) positions.
pub fn chebyshev(a: (usize, usize, usize), b: (usize, usize, usize)) -> usize {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1)).max(a.2.abs_diff(b.2))
}

/// Compute RMSE between two arrays
pub fn rmse(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (sum_sq / a.len() as f64).sqrt()
}

/// Route `log` output to the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
