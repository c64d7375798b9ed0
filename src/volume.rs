//! Volumetric intensity grid
//!
//! Every per-voxel array in the crate is a flat buffer indexed
//! `x + y*nx + z*nx*ny`, so one z plane is a contiguous `nx*ny` chunk.

use crate::error::{NeuronError, Result};

/// Extents of a volume, in (z, y, x) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dims {
    pub nz: usize,
    pub ny: usize,
    pub nx: usize,
}

impl Dims {
    pub fn new(nz: usize, ny: usize, nx: usize) -> Self {
        Self { nz, ny, nx }
    }

    /// Number of voxels.
    #[inline]
    pub fn len(&self) -> usize {
        self.nz * self.ny * self.nx
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of voxels in one z plane.
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.ny * self.nx
    }

    /// Linear index of voxel (z, y, x).
    #[inline]
    pub fn index(&self, z: usize, y: usize, x: usize) -> usize {
        x + y * self.nx + z * self.nx * self.ny
    }

    /// Inverse of [`Dims::index`].
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let plane = self.plane_len();
        let z = index / plane;
        let rem = index % plane;
        (z, rem / self.nx, rem % self.nx)
    }

    /// Extents as an (nz, ny, nx) tuple.
    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.nz, self.ny, self.nx)
    }
}

/// A stack of equally sized grayscale planes with intensities in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: Dims,
    data: Vec<f64>,
}

impl Volume {
    /// Wrap a flat buffer. The buffer length must match the extents.
    pub fn new(dims: Dims, data: Vec<f64>) -> Result<Self> {
        if dims.is_empty() {
            return Err(NeuronError::Shape(format!(
                "volume extents must be non-zero, got {:?}",
                dims.as_tuple()
            )));
        }
        if data.len() != dims.len() {
            return Err(NeuronError::Shape(format!(
                "buffer holds {} voxels but extents {:?} need {}",
                data.len(),
                dims.as_tuple(),
                dims.len()
            )));
        }
        Ok(Self { dims, data })
    }

    /// Volume with every voxel set to `value`.
    pub fn filled(dims: Dims, value: f64) -> Result<Self> {
        Self::new(dims, vec![value; dims.len()])
    }

    /// Build from nested planes `planes[z][y][x]`.
    ///
    /// Every plane must have the same height and every row the same width.
    pub fn from_planes(planes: &[Vec<Vec<f64>>]) -> Result<Self> {
        let nz = planes.len();
        let ny = planes.first().map_or(0, |p| p.len());
        let nx = planes.first().and_then(|p| p.first()).map_or(0, |r| r.len());
        let dims = Dims::new(nz, ny, nx);

        let mut data = Vec::with_capacity(dims.len());
        for (z, plane) in planes.iter().enumerate() {
            if plane.len() != ny {
                return Err(NeuronError::Shape(format!(
                    "plane {} has height {}, expected {}",
                    z,
                    plane.len(),
                    ny
                )));
            }
            for (y, row) in plane.iter().enumerate() {
                if row.len() != nx {
                    return Err(NeuronError::Shape(format!(
                        "plane {} row {} has width {}, expected {}",
                        z,
                        y,
                        row.len(),
                        nx
                    )));
                }
                data.extend_from_slice(row);
            }
        }

        Self::new(dims, data)
    }

    /// Build from raw 16-bit samples, scaled by 1/65535 into [0, 1].
    pub fn from_u16(dims: Dims, samples: &[u16]) -> Result<Self> {
        let data = samples.iter().map(|&s| s as f64 / 65535.0).collect();
        Self::new(dims, data)
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn get(&self, z: usize, y: usize, x: usize) -> f64 {
        self.data[self.dims.index(z, y, x)]
    }

    /// One z plane as a contiguous `ny*nx` slice.
    pub fn plane(&self, z: usize) -> &[f64] {
        let len = self.dims.plane_len();
        &self.data[z * len..(z + 1) * len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let dims = Dims::new(3, 4, 5);
        for i in 0..dims.len() {
            let (z, y, x) = dims.coords(i);
            assert_eq!(dims.index(z, y, x), i);
        }
        assert_eq!(dims.index(1, 0, 0), 20);
        assert_eq!(dims.index(0, 1, 0), 5);
    }

    #[test]
    fn test_from_planes() {
        let planes = vec![
            vec![vec![0.0, 0.1], vec![0.2, 0.3]],
            vec![vec![0.4, 0.5], vec![0.6, 0.7]],
        ];
        let vol = Volume::from_planes(&planes).unwrap();
        assert_eq!(vol.dims(), Dims::new(2, 2, 2));
        assert_eq!(vol.get(1, 0, 1), 0.5);
        assert_eq!(vol.get(0, 1, 0), 0.2);
        assert_eq!(vol.plane(1), &[0.4, 0.5, 0.6, 0.7]);
    }

    #[test]
    fn test_ragged_height_rejected() {
        let planes = vec![
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
            vec![vec![0.0, 0.0]],
        ];
        assert!(matches!(Volume::from_planes(&planes), Err(NeuronError::Shape(_))));
    }

    #[test]
    fn test_ragged_width_rejected() {
        let planes = vec![vec![vec![0.0, 0.0], vec![0.0]]];
        assert!(matches!(Volume::from_planes(&planes), Err(NeuronError::Shape(_))));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(Volume::from_planes(&[]).is_err());
        assert!(Volume::new(Dims::new(0, 2, 2), vec![]).is_err());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(Volume::new(Dims::new(2, 2, 2), vec![0.0; 7]).is_err());
    }

    #[test]
    fn test_from_u16_scaling() {
        let vol = Volume::from_u16(Dims::new(1, 1, 3), &[0, 32768, 65535]).unwrap();
        assert_eq!(vol.data()[0], 0.0);
        assert!((vol.data()[1] - 0.500007).abs() < 1e-5);
        assert_eq!(vol.data()[2], 1.0);
    }
}
