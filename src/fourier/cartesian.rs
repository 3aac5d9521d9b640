//! Cartesian (masked) Fourier operator
//!
//! `op` keeps the sampled entries of the unitary FFT and zeroes the rest;
//! `adj_op` is the inverse unitary FFT of the masked spectrum.

use num_complex::Complex64;

use super::trajectory::convert_locations_to_mask;
use super::FourierOperator;
use crate::error::{ReconError, Result};
use crate::fft::FftPlan3d;

pub struct CartesianFft {
    plan: FftPlan3d<f64>,
    mask: Vec<bool>,
}

impl CartesianFft {
    /// Build from a binary mask in unshifted FFT order (nonzero = sampled)
    pub fn from_mask(mask: &[u8], nx: usize, ny: usize, nz: usize) -> Result<Self> {
        if mask.len() != nx * ny * nz {
            return Err(ReconError::DimensionMismatch {
                expected: nx * ny * nz,
                got: mask.len(),
            });
        }
        Ok(Self {
            plan: FftPlan3d::new(nx, ny, nz),
            mask: mask.iter().map(|&m| m != 0).collect(),
        })
    }

    /// Build from normalized sample locations `(n_samples, n_dims)`
    pub fn from_locations(locations: &[f64], nx: usize, ny: usize, nz: usize) -> Result<Self> {
        let mask = convert_locations_to_mask(locations, (nx, ny, nz))?;
        Self::from_mask(&mask, nx, ny, nz)
    }

    /// Fully sampled grid
    pub fn full(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            plan: FftPlan3d::new(nx, ny, nz),
            mask: vec![true; nx * ny * nz],
        }
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Fraction of the grid that is sampled
    pub fn sampling_ratio(&self) -> f64 {
        self.mask.iter().filter(|&&m| m).count() as f64 / self.mask.len().max(1) as f64
    }
}

impl FourierOperator for CartesianFft {
    fn op(&self, img: &[Complex64]) -> Vec<Complex64> {
        let mut kspace = img.to_vec();
        self.plan.forward_ortho(&mut kspace);
        for (c, &m) in kspace.iter_mut().zip(self.mask.iter()) {
            if !m {
                *c = Complex64::new(0.0, 0.0);
            }
        }
        kspace
    }

    fn adj_op(&self, samples: &[Complex64]) -> Vec<Complex64> {
        let mut img: Vec<Complex64> = samples
            .iter()
            .zip(self.mask.iter())
            .map(|(&c, &m)| if m { c } else { Complex64::new(0.0, 0.0) })
            .collect();
        self.plan.inverse_ortho(&mut img);
        img
    }

    fn shape(&self) -> (usize, usize, usize) {
        self.plan.dims()
    }

    fn n_samples(&self) -> usize {
        self.mask.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::test_utils::{inner, random_complex};

    fn random_mask(n: usize) -> Vec<u8> {
        (0..n).map(|i| ((i * 2654435761usize) % 5 < 2) as u8).collect()
    }

    #[test]
    fn test_adjointness() {
        let (nx, ny, nz) = (8, 8, 1);
        let fourier = CartesianFft::from_mask(&random_mask(64), nx, ny, nz).unwrap();

        let x = random_complex(64, 1);
        let y = random_complex(64, 2);

        let lhs = inner(&fourier.op(&x), &y);
        let rhs = inner(&x, &fourier.adj_op(&y));
        assert!((lhs - rhs).norm() < 1e-10, "<Ax, y> = {}, <x, A^H y> = {}", lhs, rhs);
    }

    #[test]
    fn test_adjointness_3d() {
        let (nx, ny, nz) = (4, 6, 4);
        let n = nx * ny * nz;
        let fourier = CartesianFft::from_mask(&random_mask(n), nx, ny, nz).unwrap();

        let x = random_complex(n, 3);
        let y = random_complex(n, 4);

        let lhs = inner(&fourier.op(&x), &y);
        let rhs = inner(&x, &fourier.adj_op(&y));
        assert!((lhs - rhs).norm() < 1e-10);
    }

    #[test]
    fn test_full_mask_is_unitary() {
        let fourier = CartesianFft::full(8, 4, 1);
        let x = random_complex(32, 5);
        let back = fourier.adj_op(&fourier.op(&x));
        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_unsampled_entries_are_zero() {
        let mask = random_mask(16);
        let fourier = CartesianFft::from_mask(&mask, 4, 4, 1).unwrap();
        let k = fourier.op(&random_complex(16, 6));
        for (c, &m) in k.iter().zip(mask.iter()) {
            if m == 0 {
                assert_eq!(*c, Complex64::new(0.0, 0.0));
            }
        }
    }

    #[test]
    fn test_mask_size_mismatch() {
        assert!(CartesianFft::from_mask(&[1, 0, 1], 2, 2, 1).is_err());
    }
}
