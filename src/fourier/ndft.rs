//! Direct non-uniform discrete Fourier transform
//!
//! Evaluates `y_m = sum_n x_n exp(-2πi k_m · (n - N/2)) / sqrt(N)` exactly.
//! The per-axis phase factors are computed once at construction; each call
//! then costs O(M·N) multiply-adds. Suitable for small grids and as the
//! reference the gridding NUFFT is checked against.

use num_complex::Complex64;
use std::f64::consts::PI;

use super::trajectory::{grid_dims, validate_locations};
use super::FourierOperator;
use crate::error::Result;
use crate::fft::idx3d;

pub struct Ndft {
    nx: usize,
    ny: usize,
    nz: usize,
    n_samples: usize,
    /// Phase tables per axis, `table[m * n_axis + i]`
    phases: [Vec<Complex64>; 3],
    scale: f64,
}

impl Ndft {
    pub fn new(locations: &[f64], nx: usize, ny: usize, nz: usize) -> Result<Self> {
        let shape = (nx, ny, nz);
        let n_samples = validate_locations(locations, shape)?;
        let n_dims = grid_dims(shape).len();
        let axes = [nx, ny, nz];

        let phases: [Vec<Complex64>; 3] = std::array::from_fn(|d| {
            let n = axes[d];
            let mut table = Vec::with_capacity(n_samples * n);
            for m in 0..n_samples {
                let k = if d < n_dims { locations[m * n_dims + d] } else { 0.0 };
                for i in 0..n {
                    let c = i as f64 - (n / 2) as f64;
                    table.push(Complex64::from_polar(1.0, -2.0 * PI * k * c));
                }
            }
            table
        });

        Ok(Self {
            nx,
            ny,
            nz,
            n_samples,
            phases,
            scale: 1.0 / ((nx * ny * nz) as f64).sqrt(),
        })
    }
}

impl FourierOperator for Ndft {
    fn op(&self, img: &[Complex64]) -> Vec<Complex64> {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let [ex, ey, ez] = &self.phases;

        (0..self.n_samples)
            .map(|m| {
                let ex = &ex[m * nx..(m + 1) * nx];
                let ey = &ey[m * ny..(m + 1) * ny];
                let ez = &ez[m * nz..(m + 1) * nz];

                let mut acc = Complex64::new(0.0, 0.0);
                for k in 0..nz {
                    let mut plane = Complex64::new(0.0, 0.0);
                    for j in 0..ny {
                        let start = idx3d(0, j, k, nx, ny);
                        let row: Complex64 = img[start..start + nx]
                            .iter()
                            .zip(ex.iter())
                            .map(|(x, e)| x * e)
                            .sum();
                        plane += row * ey[j];
                    }
                    acc += plane * ez[k];
                }
                acc * self.scale
            })
            .collect()
    }

    fn adj_op(&self, samples: &[Complex64]) -> Vec<Complex64> {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let [ex, ey, ez] = &self.phases;
        let mut img = vec![Complex64::new(0.0, 0.0); nx * ny * nz];

        for (m, &y) in samples.iter().enumerate().take(self.n_samples) {
            let ex = &ex[m * nx..(m + 1) * nx];
            let ey = &ey[m * ny..(m + 1) * ny];
            let ez = &ez[m * nz..(m + 1) * nz];

            let y = y * self.scale;
            for k in 0..nz {
                let yk = y * ez[k].conj();
                for j in 0..ny {
                    let yj = yk * ey[j].conj();
                    let start = idx3d(0, j, k, nx, ny);
                    for (x, e) in img[start..start + nx].iter_mut().zip(ex.iter()) {
                        *x += yj * e.conj();
                    }
                }
            }
        }
        img
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    fn n_samples(&self) -> usize {
        self.n_samples
    }
}
