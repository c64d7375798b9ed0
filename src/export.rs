//! Visual export helpers
//!
//! Pixel buffers for external image writers: the three eigenvalues mapped to
//! RGB channels, the measure as 8-bit gray, and the max-normalized kernel as
//! 16-bit planes. Buffers are plane-major, matching the volume layout.

use crate::eigen::{is_sentinel, EigenSpectrum};
use crate::kernel::GaussianKernel;
use crate::measure::Measure;

/// Quantize a value in [0, 1] to 8 bits. Out-of-range and NaN values saturate.
#[inline]
fn to_u8(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Quantize a value in [0, 1] to 16 bits.
#[inline]
fn to_u16(v: f64) -> u16 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

/// Map `|λ0|, |λ1|, |λ2|` to R, G, B, each channel scaled by its own maximum.
///
/// Sentinel voxels are black.
pub fn eigen_to_rgb(spectrum: &EigenSpectrum) -> Vec<[u8; 3]> {
    let mut channel_max = [0.0f64; 3];
    for v in spectrum.values.iter().filter(|v| !is_sentinel(v)) {
        for c in 0..3 {
            channel_max[c] = channel_max[c].max(v[c]);
        }
    }

    spectrum
        .values
        .iter()
        .map(|v| {
            if is_sentinel(v) {
                return [0, 0, 0];
            }
            let mut px = [0u8; 3];
            for c in 0..3 {
                if channel_max[c] > 0.0 {
                    px[c] = to_u8(v[c] / channel_max[c]);
                }
            }
            px
        })
        .collect()
}

/// 8-bit gray rendering of a normalized measure.
pub fn measure_to_gray(measure: &Measure) -> Vec<u8> {
    measure.values.iter().map(|&v| to_u8(v)).collect()
}

/// Max-normalized kernel as `size` planes of 16-bit samples, z-major.
pub fn kernel_planes(kernel: &GaussianKernel) -> Vec<Vec<u16>> {
    let size = kernel.size();
    kernel
        .max_normalized()
        .chunks(size * size)
        .map(|plane| plane.iter().map(|&w| to_u16(w)).collect())
        .collect()
}
