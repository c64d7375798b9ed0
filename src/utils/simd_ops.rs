//! SIMD-accelerated passes for measure normalization
//!
//! When the `simd` feature is enabled these use 256-bit `f64x4` lanes from
//! `wide`. All operations have scalar fallbacks when SIMD is disabled.

#[cfg(feature = "simd")]
use wide::f64x4;

/// SIMD lane width (4 for f64x4)
#[cfg(feature = "simd")]
pub const SIMD_WIDTH: usize = 4;

#[cfg(not(feature = "simd"))]
pub const SIMD_WIDTH: usize = 1;

// ============================================================================
// Max Reduction
// ============================================================================

/// Largest finite value in `a`, or `None` if there is none.
#[cfg(feature = "simd")]
#[inline]
pub fn max_finite_f64(a: &[f64]) -> Option<f64> {
    let n = a.len();
    let chunks = n / SIMD_WIDTH;
    let remainder = n % SIMD_WIDTH;

    let neg_inf = f64x4::splat(f64::NEG_INFINITY);
    let mut vmax = neg_inf;

    for i in 0..chunks {
        let idx = i * SIMD_WIDTH;
        let va = f64x4::new([a[idx], a[idx + 1], a[idx + 2], a[idx + 3]]);
        // x - x is NaN exactly for NaN and infinite lanes
        let bad = (va - va).is_nan();
        let va = bad.blend(neg_inf, va);
        vmax = vmax.max(va);
    }

    let mut result = vmax.to_array().iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let start = chunks * SIMD_WIDTH;
    for &v in &a[start..start + remainder] {
        if v.is_finite() && v > result {
            result = v;
        }
    }

    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn max_finite_f64(a: &[f64]) -> Option<f64> {
    a.iter()
        .cloned()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

// ============================================================================
// Division
// ============================================================================

/// Divide array in place: a[i] = a[i] / divisor
///
/// Divides rather than multiplying by the reciprocal, which overflows for a
/// subnormal divisor.
#[cfg(feature = "simd")]
#[inline]
pub fn div_f64(a: &mut [f64], divisor: f64) {
    let n = a.len();
    let chunks = n / SIMD_WIDTH;
    let remainder = n % SIMD_WIDTH;

    let vdiv = f64x4::splat(divisor);

    for i in 0..chunks {
        let idx = i * SIMD_WIDTH;
        let va = f64x4::new([a[idx], a[idx + 1], a[idx + 2], a[idx + 3]]);
        let result = va / vdiv;
        a[idx..idx + SIMD_WIDTH].copy_from_slice(&result.to_array());
    }

    let start = chunks * SIMD_WIDTH;
    for i in 0..remainder {
        a[start + i] /= divisor;
    }
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn div_f64(a: &mut [f64], divisor: f64) {
    for val in a.iter_mut() {
        *val /= divisor;
    }
}

/// Replace every non-finite value with `fill`, returning how many were replaced.
#[inline]
pub fn replace_non_finite_f64(a: &mut [f64], fill: f64) -> usize {
    let mut replaced = 0;
    for val in a.iter_mut() {
        if !val.is_finite() {
            *val = fill;
            replaced += 1;
        }
    }
    replaced
}
