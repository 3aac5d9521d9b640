//! Identity transform: one band equal to the image

use num_complex::Complex64;

use super::{BandShape, LinearOperator};

pub struct Identity {
    shape: (usize, usize, usize),
    bands: [BandShape; 1],
}

impl Identity {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            shape: (nx, ny, nz),
            bands: [BandShape::new(nx, ny, nz)],
        }
    }
}

impl LinearOperator for Identity {
    fn op(&self, img: &[Complex64]) -> Vec<Complex64> {
        img.to_vec()
    }

    fn adj_op(&self, coeffs: &[Complex64]) -> Vec<Complex64> {
        coeffs.to_vec()
    }

    fn coeffs_shape(&self) -> &[BandShape] {
        &self.bands
    }

    fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    fn l2norm(&self) -> f64 {
        1.0
    }
}
