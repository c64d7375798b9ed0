//! Per-voxel structure tensor
//!
//! ```text
//! | IxIx  IxIy  IxIz |
//! | IxIy  IyIy  IyIz |
//! | IxIz  IyIz  IzIz |
//! ```

use rayon::prelude::*;

use crate::tensor::gradient::GradientField;
use crate::volume::Dims;

/// Symmetric 3x3 matrix stored as its six distinct entries:
///
/// ```text
/// | xx  xy  xz |
/// | xy  yy  yz |
/// | xz  yz  zz |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SymMat3 {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl SymMat3 {
    pub const ZERO: SymMat3 = SymMat3 { xx: 0.0, yy: 0.0, zz: 0.0, xy: 0.0, xz: 0.0, yz: 0.0 };

    /// Rank-1 outer product `g gᵀ` of the gradient `g = (ix, iy, iz)`.
    #[inline]
    pub fn outer(ix: f64, iy: f64, iz: f64) -> Self {
        Self {
            xx: ix * ix,
            yy: iy * iy,
            zz: iz * iz,
            xy: ix * iy,
            xz: ix * iz,
            yz: iy * iz,
        }
    }

    pub fn diagonal(a: f64, b: f64, c: f64) -> Self {
        Self { xx: a, yy: b, zz: c, ..Self::ZERO }
    }

    /// `self += w * other`, elementwise.
    #[inline]
    pub fn add_scaled(&mut self, other: &SymMat3, w: f64) {
        self.xx += w * other.xx;
        self.yy += w * other.yy;
        self.zz += w * other.zz;
        self.xy += w * other.xy;
        self.xz += w * other.xz;
        self.yz += w * other.yz;
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        self.xx + self.yy + self.zz
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.xx * (self.yy * self.zz - self.yz * self.yz)
            - self.xy * (self.xy * self.zz - self.yz * self.xz)
            + self.xz * (self.xy * self.yz - self.yy * self.xz)
    }

    /// Dense row-major copy.
    pub fn to_matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.xx, self.xy, self.xz],
            [self.xy, self.yy, self.yz],
            [self.xz, self.yz, self.zz],
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.xx.is_finite()
            && self.yy.is_finite()
            && self.zz.is_finite()
            && self.xy.is_finite()
            && self.xz.is_finite()
            && self.yz.is_finite()
    }
}

/// One symmetric tensor per voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorField {
    pub dims: Dims,
    pub data: Vec<SymMat3>,
}

impl TensorField {
    #[inline]
    pub fn at(&self, z: usize, y: usize, x: usize) -> &SymMat3 {
        &self.data[self.dims.index(z, y, x)]
    }
}

/// Build the structure tensor field, consuming the gradient.
///
/// The gradient buffers are released when this returns.
pub fn build_structure_tensor(gradient: GradientField) -> TensorField {
    let GradientField { dims, ix, iy, iz } = gradient;
    let data = ix
        .par_iter()
        .zip(iy.par_iter())
        .zip(iz.par_iter())
        .map(|((&gx, &gy), &gz)| SymMat3::outer(gx, gy, gz))
        .collect();
    TensorField { dims, data }
}
