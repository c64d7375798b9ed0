//! Gaussian block downsampling
//!
//! Produces a volume of extents `(⌊nz/m⌋, ⌊ny/m⌋, ⌊nx/m⌋)`. Output voxel `o`
//! is the Gaussian-weighted sum over its block, input voxels `o*m + k` for
//! `k in 0..m` along each axis, so the kernel centre `(m-1)/2` sits on the
//! block centre. Out-of-range input indices are clamped to the nearest edge
//! voxel (replicate padding), unlike tensor aggregation which skips them.

use log::info;
use rayon::prelude::*;

use crate::config::DownsampleConfig;
use crate::error::{NeuronError, Result};
use crate::kernel::GaussianKernel;
use crate::progress::Progress;
use crate::volume::{Dims, Volume};

/// Downsample `volume` by `magnification` with a kernel of sigma
/// `standard_deviation * magnification / 2`.
pub fn downsample(volume: &Volume, magnification: usize, standard_deviation: f64) -> Result<Volume> {
    downsample_inner(volume, magnification, standard_deviation, None)
}

/// Downsample using a [`DownsampleConfig`].
pub fn downsample_with_config(volume: &Volume, config: &DownsampleConfig) -> Result<Volume> {
    config.validate()?;
    downsample_inner(volume, config.magnification, config.base_standard_deviation, None)
}

/// Downsampling with progress callback, reporting `(output_planes_done, nz/m)`.
pub fn downsample_with_progress(
    volume: &Volume,
    magnification: usize,
    standard_deviation: f64,
    progress_callback: &(dyn Fn(usize, usize) + Sync),
) -> Result<Volume> {
    let nz_out = if magnification > 0 { volume.dims().nz / magnification } else { 0 };
    let progress = Progress::with_observer(nz_out, progress_callback);
    downsample_inner(volume, magnification, standard_deviation, Some(&progress))
}

fn downsample_inner(
    volume: &Volume,
    magnification: usize,
    standard_deviation: f64,
    progress: Option<&Progress>,
) -> Result<Volume> {
    let config = DownsampleConfig { magnification, base_standard_deviation: standard_deviation };
    config.validate()?;

    let m = magnification;
    let src = volume.dims();
    let dims = Dims::new(src.nz / m, src.ny / m, src.nx / m);
    if dims.is_empty() {
        return Err(NeuronError::Configuration(format!(
            "magnification {} exceeds volume extents {:?}",
            m,
            src.as_tuple()
        )));
    }

    let kernel = GaussianKernel::new(m, config.kernel_standard_deviation())?;
    info!(
        "Downsampling {:?} -> {:?} (m={}, sd={})",
        src.as_tuple(),
        dims.as_tuple(),
        m,
        kernel.standard_deviation()
    );

    // clamped source index for output position `o` and kernel position `k`
    let clamp = |o: usize, k: usize, extent: usize| -> usize { (o * m + k).min(extent - 1) };

    let data = volume.data();
    let mut out = vec![0.0f64; dims.len()];
    out.par_chunks_mut(dims.plane_len()).enumerate().for_each(|(oz, out_plane)| {
        for oy in 0..dims.ny {
            for ox in 0..dims.nx {
                let mut sum = 0.0;
                for k in 0..m {
                    let z = clamp(oz, k, src.nz);
                    for j in 0..m {
                        let y = clamp(oy, j, src.ny);
                        for i in 0..m {
                            let x = clamp(ox, i, src.nx);
                            sum += data[src.index(z, y, x)] * kernel.weight(k, j, i);
                        }
                    }
                }
                out_plane[ox + oy * dims.nx] = sum;
            }
        }
        if let Some(p) = progress {
            p.tick();
        }
    });

    Volume::new(dims, out)
}
