//! NIfTI volume adapter
//!
//! Loads a scan from `.nii`/`.nii.gz` bytes into a [`Volume`] with intensities
//! rescaled into [0, 1], and writes per-voxel results back as float32 NIfTI-1.
//! NIfTI stores x fastest, which is the crate's own voxel order.

use std::io::{Cursor, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use ndarray::Array;
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

use crate::error::{NeuronError, Result};
use crate::volume::{Dims, Volume};

/// A loaded scan plus the spatial metadata needed to write results back.
#[derive(Debug, Clone)]
pub struct NiftiVolume {
    pub volume: Volume,
    /// Voxel sizes (x, y, z) in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
    /// Raw (min, max) intensities mapped onto [0, 1]
    pub intensity_range: (f64, f64),
}

/// Check if bytes are gzip compressed
pub(crate) fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Load a 3D NIfTI scan from bytes (gzip is auto-detected).
///
/// 4D inputs contribute their first volume.
pub fn load_volume_nifti(bytes: &[u8]) -> Result<NiftiVolume> {
    let obj: InMemNiftiObject = if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))
            .map_err(|e| NeuronError::Format(format!("Failed to read gzipped NIfTI: {}", e)))?
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| NeuronError::Format(format!("Failed to read NIfTI: {}", e)))?
    };

    let header = obj.header();
    if header.dim[0] < 3 {
        return Err(NeuronError::Shape(format!(
            "Expected at least 3D volume, got {}D",
            header.dim[0]
        )));
    }
    let voxel_size = (
        header.pixdim[1] as f64,
        header.pixdim[2] as f64,
        header.pixdim[3] as f64,
    );
    let affine = get_affine(header);

    let array: Array<f64, _> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| NeuronError::Format(format!("Failed to convert to ndarray: {}", e)))?;
    let shape = array.shape().to_vec();
    if shape.len() < 3 {
        return Err(NeuronError::Shape(format!("Expected at least 3D array, got {}D", shape.len())));
    }

    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);
    let dims = Dims::new(nz, ny, nx);
    let mut data = Vec::with_capacity(dims.len());
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let v = if shape.len() == 3 { array[[x, y, z]] } else { array[[x, y, z, 0]] };
                data.push(v);
            }
        }
    }

    let (lo, hi) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return Err(NeuronError::Format("NIfTI volume has no finite intensities".to_string()));
    }
    let range = hi - lo;
    for v in data.iter_mut() {
        *v = if !v.is_finite() || range == 0.0 { 0.0 } else { (*v - lo) / range };
    }

    info!("Loaded NIfTI volume {:?}, intensity range [{}, {}]", dims.as_tuple(), lo, hi);
    Ok(NiftiVolume {
        volume: Volume::new(dims, data)?,
        voxel_size,
        affine,
        intensity_range: (lo, hi),
    })
}

/// Get affine transformation matrix from header
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    if header.sform_code > 0 {
        let s = &header.srow_x;
        let t = &header.srow_y;
        let u = &header.srow_z;
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else {
        let (vsx, vsy, vsz) = (
            header.pixdim[1] as f64,
            header.pixdim[2] as f64,
            header.pixdim[3] as f64,
        );
        [
            vsx, 0.0, 0.0, 0.0,
            0.0, vsy, 0.0, 0.0,
            0.0, 0.0, vsz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Encode per-voxel values as uncompressed float32 NIfTI-1 bytes.
pub fn save_nifti(
    values: &[f64],
    dims: Dims,
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>> {
    if values.len() != dims.len() {
        return Err(NeuronError::Shape(format!(
            "{} values for extents {:?}",
            values.len(),
            dims.as_tuple()
        )));
    }
    let extent = |n: usize| -> Result<i16> {
        i16::try_from(n).map_err(|_| NeuronError::Format(format!("extent {} exceeds NIfTI-1 limit", n)))
    };

    let mut header = [0u8; 348];
    header[0..4].copy_from_slice(&348i32.to_le_bytes());

    let dim: [i16; 8] = [3, extent(dims.nx)?, extent(dims.ny)?, extent(dims.nz)?, 1, 1, 1, 1];
    for (i, d) in dim.iter().enumerate() {
        header[40 + i * 2..42 + i * 2].copy_from_slice(&d.to_le_bytes());
    }

    // datatype FLOAT32, bitpix 32
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    let (vsx, vsy, vsz) = voxel_size;
    let pixdim: [f32; 8] = [1.0, vsx as f32, vsy as f32, vsz as f32, 1.0, 1.0, 1.0, 1.0];
    for (i, p) in pixdim.iter().enumerate() {
        header[76 + i * 4..80 + i * 4].copy_from_slice(&p.to_le_bytes());
    }

    // vox_offset, scl_slope, scl_inter
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // sform_code = 1, then srow_x/y/z
    header[254..256].copy_from_slice(&1i16.to_le_bytes());
    for (i, a) in affine[..12].iter().enumerate() {
        header[280 + i * 4..284 + i * 4].copy_from_slice(&(*a as f32).to_le_bytes());
    }

    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(352 + values.len() * 4);
    buffer.write_all(&header)?;
    buffer.write_all(&[0u8; 4])?;
    for &v in values {
        buffer.write_all(&(v as f32).to_le_bytes())?;
    }
    Ok(buffer)
}

/// Encode a volume with unit voxels and identity affine.
pub fn save_volume_nifti(volume: &Volume) -> Result<Vec<u8>> {
    save_nifti(volume.data(), volume.dims(), (1.0, 1.0, 1.0), &IDENTITY)
}

const IDENTITY: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// Read a NIfTI scan from a filesystem path.
pub fn read_volume_file(path: &Path) -> Result<NiftiVolume> {
    let bytes = std::fs::read(path)?;
    load_volume_nifti(&bytes)
}

/// Save per-voxel values to a file. Paths ending in `.nii.gz` are compressed.
pub fn save_nifti_to_file(
    path: &Path,
    values: &[f64],
    dims: Dims,
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<()> {
    let raw = save_nifti(values, dims, voxel_size, affine)?;
    let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        encoder.finish()?
    } else {
        raw
    };
    std::fs::write(path, &bytes)?;
    Ok(())
}
