//! Eigenvalue interchange file
//!
//! Plain-text format:
//!
//! ```text
//! nz ny nx scale
//! l0 l1 l2
//! l0 l1 l2
//! ...
//! ```
//!
//! One line per voxel in (z, y, x) order, x fastest. Every eigenvalue is
//! divided by `scale`, the largest eigenvalue in the volume (1 when the
//! spectrum is all zero), so stored values lie in [0, 1]. Failed voxels are
//! written as `nan nan nan`. Files whose name ends in `.gz` are gzip
//! compressed; gzip input is detected from its magic bytes.

use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;

use crate::eigen::{is_sentinel, EigenSpectrum};
use crate::error::{NeuronError, Result};
use crate::nifti_io::is_gzip;
use crate::volume::Dims;

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", v)
    }
}

fn parse_value(token: &str) -> Result<f64> {
    if token.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    token
        .parse::<f64>()
        .map_err(|e| NeuronError::Format(format!("invalid value '{}': {}", token, e)))
}

/// Write `spectrum` in the interchange format.
pub fn write_spectrum<W: Write>(spectrum: &EigenSpectrum, writer: W) -> Result<()> {
    let mut out = BufWriter::new(writer);
    let max = spectrum.max_value();
    let scale = if max > 0.0 { max } else { 1.0 };
    let (nz, ny, nx) = spectrum.dims.as_tuple();

    writeln!(out, "{} {} {} {}", nz, ny, nx, scale)?;
    for v in &spectrum.values {
        if is_sentinel(v) {
            writeln!(out, "nan nan nan")?;
        } else {
            writeln!(
                out,
                "{} {} {}",
                format_value(v[0] / scale),
                format_value(v[1] / scale),
                format_value(v[2] / scale)
            )?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Read a spectrum, rescaling stored values by the header scale.
pub fn read_spectrum<R: Read>(mut reader: R) -> Result<EigenSpectrum> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut tokens = text.split_whitespace();

    let mut header_dim = |name: &str| -> Result<usize> {
        let token = tokens
            .next()
            .ok_or_else(|| NeuronError::Format(format!("missing header field {}", name)))?;
        token
            .parse::<usize>()
            .map_err(|e| NeuronError::Format(format!("invalid {} '{}': {}", name, token, e)))
    };
    let nz = header_dim("nz")?;
    let ny = header_dim("ny")?;
    let nx = header_dim("nx")?;
    let scale = tokens
        .next()
        .ok_or_else(|| NeuronError::Format("missing header field scale".to_string()))
        .and_then(parse_value)?;
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(NeuronError::Format(format!("scale must be > 0, got {}", scale)));
    }

    let dims = Dims::new(nz, ny, nx);
    let mut values = Vec::with_capacity(dims.len());
    for i in 0..dims.len() {
        let mut voxel = [0.0f64; 3];
        for slot in voxel.iter_mut() {
            let token = tokens.next().ok_or_else(|| {
                NeuronError::Format(format!("truncated data at voxel {} of {}", i, dims.len()))
            })?;
            *slot = parse_value(token)? * scale;
        }
        values.push(voxel);
    }
    if tokens.next().is_some() {
        return Err(NeuronError::Format(format!(
            "trailing data after {} voxels",
            dims.len()
        )));
    }

    EigenSpectrum::new(dims, values)
}

/// Encode a spectrum to bytes, gzip compressed if requested.
pub fn save_spectrum_bytes(spectrum: &EigenSpectrum, gzip: bool) -> Result<Vec<u8>> {
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        write_spectrum(spectrum, &mut encoder)?;
        Ok(encoder.finish()?)
    } else {
        let mut buffer = Vec::new();
        write_spectrum(spectrum, &mut buffer)?;
        Ok(buffer)
    }
}

/// Decode a spectrum from bytes (gzip is auto-detected).
pub fn load_spectrum_bytes(bytes: &[u8]) -> Result<EigenSpectrum> {
    if is_gzip(bytes) {
        read_spectrum(GzDecoder::new(Cursor::new(bytes)))
    } else {
        read_spectrum(Cursor::new(bytes))
    }
}

/// Save a spectrum to a file. Paths ending in `.gz` are gzip compressed.
pub fn save_spectrum_file(path: &Path, spectrum: &EigenSpectrum) -> Result<()> {
    let gzip = path.to_string_lossy().ends_with(".gz");
    let bytes = save_spectrum_bytes(spectrum, gzip)?;
    std::fs::write(path, &bytes)?;
    info!("Wrote eigen spectrum {:?} to {}", spectrum.dims.as_tuple(), path.display());
    Ok(())
}

/// Load a spectrum from a file.
pub fn load_spectrum_file(path: &Path) -> Result<EigenSpectrum> {
    let bytes = std::fs::read(path)?;
    load_spectrum_bytes(&bytes)
}
