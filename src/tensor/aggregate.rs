//! Gaussian-weighted windowed aggregation of the structure-tensor field
//!
//! For each voxel the aggregated tensor is
//!
//! `sum_{k,j,i} W[k,j,i] * T[z + k - h, y + j - h, x + i - h]`, with `h = size / 2`.
//!
//! Neighbours outside the volume are skipped, not clamped, and the partial sum
//! at the border is not renormalized. Boundary voxels therefore carry less
//! total kernel mass than interior ones.

use log::info;
use rayon::prelude::*;

use crate::kernel::GaussianKernel;
use crate::progress::Progress;
use crate::tensor::structure::{SymMat3, TensorField};

/// In-bounds `(grid position, neighbour index)` pairs along one axis.
fn axis_taps(center: usize, extent: usize, size: usize, half: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..size).filter_map(move |k| {
        let n = (center + k).checked_sub(half)?;
        if n < extent {
            Some((k, n))
        } else {
            None
        }
    })
}

/// Aggregate the tensor field with `kernel`, returning a new field.
pub fn aggregate(field: &TensorField, kernel: &GaussianKernel) -> TensorField {
    aggregate_inner(field, kernel, None)
}

/// Aggregation with progress callback, reporting `(planes_done, nz)`.
pub fn aggregate_with_progress(
    field: &TensorField,
    kernel: &GaussianKernel,
    progress_callback: &(dyn Fn(usize, usize) + Sync),
) -> TensorField {
    let progress = Progress::with_observer(field.dims.nz, progress_callback);
    aggregate_inner(field, kernel, Some(&progress))
}

fn aggregate_inner(
    field: &TensorField,
    kernel: &GaussianKernel,
    progress: Option<&Progress>,
) -> TensorField {
    let dims = field.dims;
    let size = kernel.size();
    let half = kernel.half();
    let plane = dims.plane_len();

    info!(
        "Aggregating {:?} tensors with window {} (sd {})",
        dims.as_tuple(),
        size,
        kernel.standard_deviation()
    );

    let mut out = vec![SymMat3::ZERO; dims.len()];
    out.par_chunks_mut(plane).enumerate().for_each(|(z, out_plane)| {
        for y in 0..dims.ny {
            for x in 0..dims.nx {
                let mut acc = SymMat3::ZERO;
                for (k, nz) in axis_taps(z, dims.nz, size, half) {
                    for (j, ny) in axis_taps(y, dims.ny, size, half) {
                        for (i, nx) in axis_taps(x, dims.nx, size, half) {
                            acc.add_scaled(&field.data[dims.index(nz, ny, nx)], kernel.weight(k, j, i));
                        }
                    }
                }
                out_plane[x + y * dims.nx] = acc;
            }
        }
        if let Some(p) = progress {
            p.tick();
        }
    });

    TensorField { dims, data: out }
}
