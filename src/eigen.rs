//! Symmetric 3x3 eigen-decomposition of the aggregated tensor field
//!
//! Householder reduction to tridiagonal form followed by implicit QL iteration
//! (the EISPACK `tred2`/`tql2` pair, as in JAMA). This is more robust than the
//! closed-form Cardano solution when two or three eigenvalues coincide.
//!
//! Reference:
//! Bowdler, H., Martin, R.S., Reinsch, C., Wilkinson, J.H. (1968).
//! "The QR and QL algorithms for symmetric matrices." Numer. Math. 11:293-306.

use log::{info, warn};
use rayon::prelude::*;

use crate::error::{NeuronError, Result};
use crate::progress::Progress;
use crate::tensor::{SymMat3, TensorField};
use crate::volume::Dims;

/// QL sweeps allowed per eigenvalue before the voxel is declared failed.
const MAX_QL_ITERATIONS: usize = 30;

/// Value stored for voxels whose decomposition failed.
pub const SENTINEL: [f64; 3] = [f64::NAN; 3];

/// Eigenvalues (ascending by signed value) and unit eigenvectors as columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    pub values: [f64; 3],
    /// `vectors[r][c]` is row `r` of eigenvector `c`.
    pub vectors: [[f64; 3]; 3],
}

impl Decomposition {
    /// Eigenvector paired with `values[c]`.
    pub fn vector(&self, c: usize) -> [f64; 3] {
        [self.vectors[0][c], self.vectors[1][c], self.vectors[2][c]]
    }
}

/// Full decomposition of a symmetric matrix.
///
/// Returns `None` for non-finite input or when QL iteration does not converge.
pub fn decompose(m: &SymMat3) -> Option<Decomposition> {
    if !m.is_finite() {
        return None;
    }

    let mut v = m.to_matrix();
    let mut d = [0.0f64; 3];
    let mut e = [0.0f64; 3];

    tred2(&mut v, &mut d, &mut e);
    if !tql2(&mut v, &mut d, &mut e) {
        return None;
    }

    if d.iter().any(|x| !x.is_finite()) {
        return None;
    }
    Some(Decomposition { values: d, vectors: v })
}

/// Eigenvalues of a symmetric matrix, ascending by signed value.
pub fn eigenvalues_3x3_symmetric(m: &SymMat3) -> Option<(f64, f64, f64)> {
    decompose(m).map(|dec| (dec.values[0], dec.values[1], dec.values[2]))
}

/// Absolute values sorted ascending: `|λ0| <= |λ1| <= |λ2|`.
pub fn abs_sorted(values: [f64; 3]) -> [f64; 3] {
    let mut abs = [values[0].abs(), values[1].abs(), values[2].abs()];
    abs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    abs
}

/// Householder reduction of a symmetric matrix to tridiagonal form.
///
/// On return `d` holds the diagonal, `e[1..]` the subdiagonal and `v` the
/// accumulated orthogonal transform.
fn tred2(v: &mut [[f64; 3]; 3], d: &mut [f64; 3], e: &mut [f64; 3]) {
    const N: usize = 3;

    for j in 0..N {
        d[j] = v[N - 1][j];
    }

    for i in (1..N).rev() {
        let mut scale = 0.0;
        let mut h = 0.0;
        for k in 0..i {
            scale += d[k].abs();
        }

        if scale == 0.0 {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
                v[j][i] = 0.0;
            }
        } else {
            for k in 0..i {
                d[k] /= scale;
                h += d[k] * d[k];
            }
            let f = d[i - 1];
            let mut g = h.sqrt();
            if f > 0.0 {
                g = -g;
            }
            e[i] = scale * g;
            h -= f * g;
            d[i - 1] = f - g;
            for j in 0..i {
                e[j] = 0.0;
            }

            for j in 0..i {
                let f = d[j];
                v[j][i] = f;
                let mut g = e[j] + v[j][j] * f;
                for k in (j + 1)..i {
                    g += v[k][j] * d[k];
                    e[k] += v[k][j] * f;
                }
                e[j] = g;
            }

            let mut f = 0.0;
            for j in 0..i {
                e[j] /= h;
                f += e[j] * d[j];
            }
            let hh = f / (h + h);
            for j in 0..i {
                e[j] -= hh * d[j];
            }
            for j in 0..i {
                let f = d[j];
                let g = e[j];
                for k in j..i {
                    v[k][j] -= f * e[k] + g * d[k];
                }
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
            }
        }
        d[i] = h;
    }

    for i in 0..(N - 1) {
        v[N - 1][i] = v[i][i];
        v[i][i] = 1.0;
        let h = d[i + 1];
        if h != 0.0 {
            for k in 0..=i {
                d[k] = v[k][i + 1] / h;
            }
            for j in 0..=i {
                let mut g = 0.0;
                for k in 0..=i {
                    g += v[k][i + 1] * v[k][j];
                }
                for k in 0..=i {
                    v[k][j] -= g * d[k];
                }
            }
        }
        for k in 0..=i {
            v[k][i + 1] = 0.0;
        }
    }

    for j in 0..N {
        d[j] = v[N - 1][j];
        v[N - 1][j] = 0.0;
    }
    v[N - 1][N - 1] = 1.0;
    e[0] = 0.0;
}

/// Implicit QL iteration on the tridiagonal form, then ascending sort.
///
/// Returns `false` if any eigenvalue needs more than `MAX_QL_ITERATIONS` sweeps.
fn tql2(v: &mut [[f64; 3]; 3], d: &mut [f64; 3], e: &mut [f64; 3]) -> bool {
    const N: usize = 3;

    for i in 1..N {
        e[i - 1] = e[i];
    }
    e[N - 1] = 0.0;

    let mut f = 0.0f64;
    let mut tst1 = 0.0f64;
    let eps = f64::EPSILON;

    for l in 0..N {
        tst1 = tst1.max(d[l].abs() + e[l].abs());
        let mut m = l;
        while m < N - 1 {
            if e[m].abs() <= eps * tst1 {
                break;
            }
            m += 1;
        }

        if m > l {
            let mut iter = 0;
            loop {
                iter += 1;
                if iter > MAX_QL_ITERATIONS {
                    return false;
                }

                let g = d[l];
                let mut p = (d[l + 1] - g) / (2.0 * e[l]);
                let mut r = p.hypot(1.0);
                if p < 0.0 {
                    r = -r;
                }
                d[l] = e[l] / (p + r);
                d[l + 1] = e[l] * (p + r);
                let dl1 = d[l + 1];
                let h = g - d[l];
                for i in (l + 2)..N {
                    d[i] -= h;
                }
                f += h;

                p = d[m];
                let mut c = 1.0;
                let mut c2 = c;
                let mut c3 = c;
                let el1 = e[l + 1];
                let mut s = 0.0;
                let mut s2 = 0.0;
                for i in (l..m).rev() {
                    c3 = c2;
                    c2 = c;
                    s2 = s;
                    let g = c * e[i];
                    let h = c * p;
                    r = p.hypot(e[i]);
                    e[i + 1] = s * r;
                    s = e[i] / r;
                    c = p / r;
                    p = c * d[i] - s * g;
                    d[i + 1] = h + s * (c * g + s * d[i]);

                    for k in 0..N {
                        let vh = v[k][i + 1];
                        v[k][i + 1] = s * v[k][i] + c * vh;
                        v[k][i] = c * v[k][i] - s * vh;
                    }
                }
                p = -s * s2 * c3 * el1 * e[l] / dl1;
                e[l] = s * p;
                d[l] = c * p;

                if !(e[l].abs() > eps * tst1) {
                    break;
                }
            }
        }
        d[l] += f;
        e[l] = 0.0;
    }

    for i in 0..(N - 1) {
        let mut k = i;
        let mut p = d[i];
        for j in (i + 1)..N {
            if d[j] < p {
                k = j;
                p = d[j];
            }
        }
        if k != i {
            d[k] = d[i];
            d[i] = p;
            for row in v.iter_mut() {
                row.swap(i, k);
            }
        }
    }
    true
}

/// Per-voxel absolute eigenvalues `|λ0| <= |λ1| <= |λ2|`.
///
/// Voxels whose decomposition failed hold [`SENTINEL`].
#[derive(Debug, Clone, PartialEq)]
pub struct EigenSpectrum {
    pub dims: Dims,
    pub values: Vec<[f64; 3]>,
    failures: usize,
}

impl EigenSpectrum {
    /// Wrap precomputed spectra, counting sentinel voxels.
    pub fn new(dims: Dims, values: Vec<[f64; 3]>) -> Result<Self> {
        if values.len() != dims.len() {
            return Err(NeuronError::Shape(format!(
                "spectrum holds {} voxels but extents {:?} need {}",
                values.len(),
                dims.as_tuple(),
                dims.len()
            )));
        }
        let failures = values.iter().filter(|v| is_sentinel(v)).count();
        Ok(Self { dims, values, failures })
    }

    /// Number of voxels stored as the sentinel.
    pub fn failures(&self) -> usize {
        self.failures
    }

    #[inline]
    pub fn at(&self, z: usize, y: usize, x: usize) -> [f64; 3] {
        self.values[self.dims.index(z, y, x)]
    }

    /// Largest finite eigenvalue in the volume, 0.0 if none.
    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .flat_map(|v| v.iter())
            .filter(|v| v.is_finite())
            .fold(0.0, |acc, &v| acc.max(v))
    }
}

#[inline]
pub fn is_sentinel(values: &[f64; 3]) -> bool {
    values.iter().any(|v| v.is_nan())
}

/// Decompose every voxel of the aggregated field.
///
/// Failed voxels are stored as [`SENTINEL`]; if more than half fail the run
/// is aborted with [`NeuronError::Numeric`].
pub fn solve_field(field: &TensorField) -> Result<EigenSpectrum> {
    solve_field_inner(field, None)
}

/// Eigen-decomposition with progress callback, reporting `(planes_done, nz)`.
pub fn solve_field_with_progress(
    field: &TensorField,
    progress_callback: &(dyn Fn(usize, usize) + Sync),
) -> Result<EigenSpectrum> {
    let progress = Progress::with_observer(field.dims.nz, progress_callback);
    solve_field_inner(field, Some(&progress))
}

fn solve_field_inner(field: &TensorField, progress: Option<&Progress>) -> Result<EigenSpectrum> {
    let dims = field.dims;
    let plane = dims.plane_len();
    info!("Eigen-decomposition of {:?} tensors", dims.as_tuple());

    let mut values = vec![[0.0f64; 3]; dims.len()];
    let failures: usize = values
        .par_chunks_mut(plane)
        .zip(field.data.par_chunks(plane))
        .map(|(out, tensors)| {
            let mut failed = 0;
            for (dst, t) in out.iter_mut().zip(tensors) {
                *dst = match decompose(t) {
                    Some(dec) => abs_sorted(dec.values),
                    None => {
                        failed += 1;
                        SENTINEL
                    }
                };
            }
            if let Some(p) = progress {
                p.tick();
            }
            failed
        })
        .sum();

    if failures > 0 {
        warn!("{} of {} voxels failed eigen-decomposition", failures, dims.len());
    }
    if failures * 2 > dims.len() {
        return Err(NeuronError::Numeric(format!(
            "eigen-decomposition failed for {} of {} voxels",
            failures,
            dims.len()
        )));
    }

    Ok(EigenSpectrum { dims, values, failures })
}
