//! Finite-difference gradient estimation
//!
//! Centred difference `(V[i+1] - V[i-1]) / 2` in the interior, forward
//! difference `V[1] - V[0]` at the lower edge and backward difference
//! `V[n-1] - V[n-2]` at the upper edge. The choice is made per axis, so a
//! voxel on a face is one-sided only along the axis normal to that face.
//! An axis of extent 1 has zero derivative. No smoothing is applied.

use rayon::prelude::*;

use crate::progress::Progress;
use crate::volume::{Dims, Volume};

/// Differentiation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Per-voxel derivatives along each axis, same extents as the source volume.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    pub dims: Dims,
    pub ix: Vec<f64>,
    pub iy: Vec<f64>,
    pub iz: Vec<f64>,
}

impl GradientField {
    /// Derivatives at voxel (z, y, x) as `(Ix, Iy, Iz)`.
    #[inline]
    pub fn at(&self, z: usize, y: usize, x: usize) -> (f64, f64, f64) {
        let i = self.dims.index(z, y, x);
        (self.ix[i], self.iy[i], self.iz[i])
    }
}

/// One-sided at the edges, centred inside. `at(j)` reads sample `j` on the line.
#[inline]
fn difference<F: Fn(usize) -> f64>(at: F, i: usize, n: usize) -> f64 {
    if n < 2 {
        0.0
    } else if i == 0 {
        at(1) - at(0)
    } else if i + 1 >= n {
        at(i) - at(i - 1)
    } else {
        (at(i + 1) - at(i - 1)) / 2.0
    }
}

/// Derivative of `data` along one axis.
pub fn gradient_axis(data: &[f64], dims: Dims, axis: Axis) -> Vec<f64> {
    gradient_axis_inner(data, dims, axis, None)
}

fn gradient_axis_inner(
    data: &[f64],
    dims: Dims,
    axis: Axis,
    progress: Option<&Progress>,
) -> Vec<f64> {
    let Dims { nz, ny, nx } = dims;
    let plane = dims.plane_len();
    let mut grad = vec![0.0f64; dims.len()];

    grad.par_chunks_mut(plane).enumerate().for_each(|(z, out)| {
        for y in 0..ny {
            for x in 0..nx {
                out[x + y * nx] = match axis {
                    Axis::X => difference(|i| data[dims.index(z, y, i)], x, nx),
                    Axis::Y => difference(|j| data[dims.index(z, j, x)], y, ny),
                    Axis::Z => difference(|k| data[dims.index(k, y, x)], z, nz),
                };
            }
        }
        if let Some(p) = progress {
            p.tick();
        }
    });

    grad
}

/// Compute Ix, Iy and Iz for every voxel.
pub fn estimate_gradient(volume: &Volume) -> GradientField {
    let dims = volume.dims();
    let data = volume.data();
    GradientField {
        dims,
        ix: gradient_axis(data, dims, Axis::X),
        iy: gradient_axis(data, dims, Axis::Y),
        iz: gradient_axis(data, dims, Axis::Z),
    }
}

/// Gradient estimation with progress callback
///
/// Same as `estimate_gradient` but reports `(planes_done, 3 * nz)` as
/// z planes finish across the three axes.
pub fn estimate_gradient_with_progress(
    volume: &Volume,
    progress_callback: &(dyn Fn(usize, usize) + Sync),
) -> GradientField {
    let dims = volume.dims();
    let data = volume.data();
    let progress = Progress::with_observer(3 * dims.nz, progress_callback);
    GradientField {
        dims,
        ix: gradient_axis_inner(data, dims, Axis::X, Some(&progress)),
        iy: gradient_axis_inner(data, dims, Axis::Y, Some(&progress)),
        iz: gradient_axis_inner(data, dims, Axis::Z, Some(&progress)),
    }
}
