//! Saliency measure from the eigen-spectrum or the aggregated tensor
//!
//! Two reductions are available, one per run:
//! - Noble corner measure: `2·det(T) / (trace(T)² + c)`
//! - Eigen combination: `k·(λ0+λ1+λ2)² − λ0·λ1·λ2`
//!
//! The raw measure is then divided by its global maximum over the whole volume.
//! Values are not clamped, so a voxel whose raw measure is negative stays
//! negative after normalization.
//!
//! Reference:
//! Noble, J.A. (1988). "Finding corners." Image and Vision Computing 6(2):121-128.

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::MeasureVariant;
use crate::eigen::EigenSpectrum;
use crate::error::{NeuronError, Result};
use crate::tensor::{SymMat3, TensorField};
use crate::utils::simd_ops::{div_f64, max_finite_f64, replace_non_finite_f64};
use crate::volume::Dims;

/// Normalized per-voxel saliency, same extents as the source volume.
///
/// The maximum is 1.0. The Noble measure of a positive semi-definite tensor is
/// non-negative up to rounding, so its values lie in [0, 1]. The eigen combination can go
/// negative where `λ0·λ1·λ2` outweighs `k·(λ0+λ1+λ2)²`; those values are kept
/// as is rather than clamped to 0, so this variant only guarantees `<= 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub dims: Dims,
    pub values: Vec<f64>,
    /// Global maximum of the raw measure used as divisor.
    pub raw_max: f64,
}

impl Measure {
    #[inline]
    pub fn at(&self, z: usize, y: usize, x: usize) -> f64 {
        self.values[self.dims.index(z, y, x)]
    }

    /// Location and value of the largest measure.
    pub fn argmax(&self) -> Option<((usize, usize, usize), f64)> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            })
            .map(|(i, v)| (self.dims.coords(i), v))
    }
}

/// Noble measure of a single tensor. NaN when the denominator is zero.
#[inline]
pub fn noble(t: &SymMat3, constant: f64) -> f64 {
    let tr = t.trace();
    let denom = tr * tr + constant;
    if denom == 0.0 {
        return f64::NAN;
    }
    2.0 * t.determinant() / denom
}

/// Eigen-combination measure of `|λ0| <= |λ1| <= |λ2|`.
#[inline]
pub fn eigen_combination(l: &[f64; 3], k: f64) -> f64 {
    let sum = l[0] + l[1] + l[2];
    k * sum * sum - l[0] * l[1] * l[2]
}

/// Raw eigen-combination measure. Sentinel voxels yield NaN.
pub fn raw_from_spectrum(spectrum: &EigenSpectrum, k: f64) -> Vec<f64> {
    spectrum.values.par_iter().map(|l| eigen_combination(l, k)).collect()
}

/// Raw Noble measure computed directly from the aggregated tensor.
pub fn raw_from_tensor(field: &TensorField, constant: f64) -> Vec<f64> {
    field.data.par_iter().map(|t| noble(t, constant)).collect()
}

/// Raw measure for `variant`.
///
/// The Noble variant needs the aggregated tensor; the eigen combination needs
/// the spectrum.
pub fn compute_raw(
    variant: MeasureVariant,
    spectrum: Option<&EigenSpectrum>,
    tensor: Option<&TensorField>,
) -> Result<Vec<f64>> {
    match variant {
        MeasureVariant::Noble { constant } => {
            if !(constant > 0.0) {
                return Err(NeuronError::Configuration(format!(
                    "Noble measure constant must be > 0, got {}",
                    constant
                )));
            }
            let field = tensor.ok_or_else(|| {
                NeuronError::Configuration("Noble measure requires the aggregated tensor".to_string())
            })?;
            Ok(raw_from_tensor(field, constant))
        }
        MeasureVariant::EigenCombination { k } => {
            let spectrum = spectrum.ok_or_else(|| {
                NeuronError::Configuration("eigen combination requires the eigen spectrum".to_string())
            })?;
            Ok(raw_from_spectrum(spectrum, k))
        }
    }
}

/// Divide every voxel by the global maximum of `raw`.
///
/// Undefined (NaN) voxels are excluded from the maximum and written as 0.
/// A maximum `<= 0` makes normalization undefined and is an error.
pub fn normalize(dims: Dims, mut raw: Vec<f64>) -> Result<Measure> {
    if raw.len() != dims.len() {
        return Err(NeuronError::Shape(format!(
            "raw measure holds {} voxels but extents {:?} need {}",
            raw.len(),
            dims.as_tuple(),
            dims.len()
        )));
    }

    let raw_max = max_finite_f64(&raw).unwrap_or(0.0);
    debug!("raw measure maximum {:.6e}", raw_max);
    if !(raw_max > 0.0) {
        return Err(NeuronError::Configuration(format!(
            "measure normalization undefined: global maximum is {}",
            raw_max
        )));
    }

    div_f64(&mut raw, raw_max);
    let undefined = replace_non_finite_f64(&mut raw, 0.0);
    if undefined > 0 {
        warn!("{} voxels have an undefined measure, written as 0", undefined);
    }

    Ok(Measure { dims, values: raw, raw_max })
}

/// Compute and normalize the measure for `variant`.
pub fn compute(
    variant: MeasureVariant,
    dims: Dims,
    spectrum: Option<&EigenSpectrum>,
    tensor: Option<&TensorField>,
) -> Result<Measure> {
    info!("Computing {:?} measure over {:?}", variant, dims.as_tuple());
    let raw = compute_raw(variant, spectrum, tensor)?;
    normalize(dims, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eigen::SENTINEL;

    #[test]
    fn test_eigen_combination_zero() {
        assert_eq!(eigen_combination(&[0.0, 0.0, 0.0], 0.06), 0.0);
    }

    #[test]
    fn test_eigen_combination_value() {
        // 0.06 * 36 - 6
        let m = eigen_combination(&[1.0, 2.0, 3.0], 0.06);
        assert!((m - (2.16 - 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_noble_value() {
        let t = SymMat3::diagonal(1.0, 2.0, 3.0);
        let m = noble(&t, 0.5);
        assert!((m - 2.0 * 6.0 / 36.5).abs() < 1e-12);
        assert_eq!(noble(&SymMat3::ZERO, 0.5), 0.0);
        assert!(noble(&SymMat3::ZERO, 0.0).is_nan());
    }

    #[test]
    fn test_zero_voxel_normalizes_to_zero() {
        let dims = Dims::new(1, 1, 3);
        let spectrum = EigenSpectrum::new(dims, vec![[0.0; 3], [0.1, 0.2, 0.3], [0.0, 0.0, 1.0]]).unwrap();
        let measure = compute(MeasureVariant::default(), dims, Some(&spectrum), None).unwrap();
        assert_eq!(measure.values[0], 0.0);
        let max = measure.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
        assert_eq!(measure.argmax().map(|(c, _)| c), Some((0, 0, 2)));
    }

    #[test]
    fn test_all_zero_is_error() {
        let dims = Dims::new(2, 2, 2);
        let spectrum = EigenSpectrum::new(dims, vec![[0.0; 3]; 8]).unwrap();
        let raw = compute_raw(MeasureVariant::default(), Some(&spectrum), None).unwrap();
        assert!(raw.iter().all(|&v| v == 0.0));
        assert!(matches!(normalize(dims, raw), Err(NeuronError::Configuration(_))));
    }

    #[test]
    fn test_sentinel_excluded_from_max() {
        let dims = Dims::new(1, 1, 3);
        let spectrum = EigenSpectrum::new(dims, vec![SENTINEL, [0.0, 0.0, 2.0], [0.0, 0.0, 1.0]]).unwrap();
        let measure = compute(MeasureVariant::default(), dims, Some(&spectrum), None).unwrap();
        assert_eq!(measure.values[0], 0.0);
        assert!((measure.values[1] - 1.0).abs() < 1e-12);
        assert!((measure.values[2] - 0.25).abs() < 1e-12);
        assert!((measure.raw_max - 0.24).abs() < 1e-12);
    }

    #[test]
    fn test_noble_requires_tensor() {
        let dims = Dims::new(1, 1, 1);
        let variant = MeasureVariant::Noble { constant: 1e-4 };
        assert!(compute(variant, dims, None, None).is_err());

        let field = TensorField { dims, data: vec![SymMat3::diagonal(1.0, 1.0, 1.0)] };
        let measure = compute(variant, dims, None, Some(&field)).unwrap();
        assert!((measure.values[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_values_survive_normalization() {
        let dims = Dims::new(1, 1, 2);
        let spectrum = EigenSpectrum::new(dims, vec![[1.0, 2.0, 3.0], [0.0, 0.0, 1.0]]).unwrap();
        let measure = compute(MeasureVariant::default(), dims, Some(&spectrum), None).unwrap();
        // (0.06 * 36 - 6) / 0.06
        assert!((measure.values[0] - (-64.0)).abs() < 1e-9);
        assert!((measure.values[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_subnormal_maximum_normalizes_to_one() {
        let measure = normalize(Dims::new(1, 1, 2), vec![1e-310, 5e-311]).unwrap();
        assert_eq!(measure.values[0], 1.0);
        assert!((measure.values[1] - 0.5).abs() < 1e-9);
        assert_eq!(measure.raw_max, 1e-310);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(normalize(Dims::new(1, 1, 2), vec![1.0]), Err(NeuronError::Shape(_))));
    }
}
