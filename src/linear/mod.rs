//! Sparsifying linear transforms
//!
//! A `LinearOperator` maps an image to a flat vector of coefficients made of
//! consecutive sub-bands, and back. `coeffs_shape` is the manifest that
//! describes the sub-bands in order; `flatten`/`unflatten` convert between
//! the flat vector and a list of `Band`s.
//!
//! Multi-channel variables are channel-major: each channel is transformed
//! independently and the coefficient vectors are concatenated.

pub mod haar;
pub mod identity;

pub use haar::*;
pub use identity::*;

use num_complex::Complex64;

use crate::error::{ReconError, Result};
use crate::solvers::power::power_method;

/// Dimensions of one sub-band
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandShape {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl BandShape {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One sub-band of a decomposition
#[derive(Clone, Debug, PartialEq)]
pub struct Band {
    pub shape: BandShape,
    pub data: Vec<Complex64>,
}

/// Concatenate bands into a flat vector plus the manifest to undo it
pub fn flatten(bands: &[Band]) -> (Vec<Complex64>, Vec<BandShape>) {
    let total = bands.iter().map(|b| b.data.len()).sum();
    let mut flat = Vec::with_capacity(total);
    let mut shapes = Vec::with_capacity(bands.len());
    for band in bands {
        flat.extend_from_slice(&band.data);
        shapes.push(band.shape);
    }
    (flat, shapes)
}

/// Split a flat vector back into bands
pub fn unflatten(flat: &[Complex64], shapes: &[BandShape]) -> Result<Vec<Band>> {
    let total: usize = shapes.iter().map(|s| s.len()).sum();
    if total != flat.len() {
        return Err(ReconError::DimensionMismatch { expected: total, got: flat.len() });
    }

    let mut bands = Vec::with_capacity(shapes.len());
    let mut offset = 0;
    for &shape in shapes {
        bands.push(Band { shape, data: flat[offset..offset + shape.len()].to_vec() });
        offset += shape.len();
    }
    Ok(bands)
}

/// Image <-> coefficient transform
pub trait LinearOperator: Sync {
    /// Image (nx * ny * nz) -> flat coefficients
    fn op(&self, img: &[Complex64]) -> Vec<Complex64>;

    /// Flat coefficients -> image
    fn adj_op(&self, coeffs: &[Complex64]) -> Vec<Complex64>;

    /// Sub-band manifest, in the order bands appear in `op`'s output
    fn coeffs_shape(&self) -> &[BandShape];

    /// Image dimensions (nx, ny, nz)
    fn shape(&self) -> (usize, usize, usize);

    fn n_coeffs(&self) -> usize {
        self.coeffs_shape().iter().map(|b| b.len()).sum()
    }

    fn image_len(&self) -> usize {
        let (nx, ny, nz) = self.shape();
        nx * ny * nz
    }

    /// Number of coefficients in each band
    fn band_sizes(&self) -> Vec<usize> {
        self.coeffs_shape().iter().map(|b| b.len()).collect()
    }

    /// `op` applied to every channel of a channel-major image stack
    fn op_channels(&self, imgs: &[Complex64]) -> Vec<Complex64> {
        let n = self.image_len();
        let mut out = Vec::with_capacity(imgs.len() / n.max(1) * self.n_coeffs());
        for img in imgs.chunks(n.max(1)) {
            out.extend(self.op(img));
        }
        out
    }

    /// `adj_op` applied to every channel of a channel-major coefficient stack
    fn adj_op_channels(&self, coeffs: &[Complex64]) -> Vec<Complex64> {
        let n = self.n_coeffs();
        let mut out = Vec::with_capacity(coeffs.len() / n.max(1) * self.image_len());
        for c in coeffs.chunks(n.max(1)) {
            out.extend(self.adj_op(c));
        }
        out
    }

    /// Spectral norm `||W||`, estimated with the power method on `W^H W`
    fn l2norm(&self) -> f64 {
        power_method(|x| self.adj_op(&self.op(x)), self.image_len(), 200, 1e-6).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_unflatten_roundtrip() {
        let bands = vec![
            Band {
                shape: BandShape::new(2, 2, 1),
                data: (0..4).map(|i| Complex64::new(i as f64, -(i as f64))).collect(),
            },
            Band {
                shape: BandShape::new(3, 1, 1),
                data: vec![Complex64::new(7.0, 0.5); 3],
            },
            Band {
                shape: BandShape::new(1, 2, 2),
                data: (0..4).map(|i| Complex64::new(0.0, i as f64)).collect(),
            },
        ];

        let (flat, shapes) = flatten(&bands);
        assert_eq!(flat.len(), 11);
        assert_eq!(shapes.len(), 3);

        let back = unflatten(&flat, &shapes).unwrap();
        assert_eq!(back, bands);
    }

    #[test]
    fn test_unflatten_size_mismatch() {
        let shapes = vec![BandShape::new(2, 2, 1)];
        let err = unflatten(&[Complex64::new(0.0, 0.0); 3], &shapes).unwrap_err();
        assert_eq!(err, ReconError::DimensionMismatch { expected: 4, got: 3 });
    }
}
