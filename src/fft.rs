//! FFT plans for 3D transforms using rustfft
//!
//! Provides cached forward/inverse plans over an `(nx, ny, nz)` grid stored
//! in Fortran (column-major) order. A 2D image is a grid with `nz = 1`.
//!
//! Plans are immutable once built: scratch buffers are allocated per call so
//! a single plan can be shared by reference between operators and threads.

use num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{Fft, FftDirection, FftNum, FftPlanner};
use std::sync::Arc;

/// Cached 3D FFT plans (unnormalized transforms)
pub struct FftPlan3d<T: FftNum = f64> {
    nx: usize,
    ny: usize,
    nz: usize,
    forward: [Arc<dyn Fft<T>>; 3],
    inverse: [Arc<dyn Fft<T>>; 3],
}

impl<T: FftNum> FftPlan3d<T> {
    /// Plan forward and inverse transforms for the given dimensions
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        let mut planner = FftPlanner::<T>::new();

        let forward = [
            planner.plan_fft(nx, FftDirection::Forward),
            planner.plan_fft(ny, FftDirection::Forward),
            planner.plan_fft(nz, FftDirection::Forward),
        ];
        let inverse = [
            planner.plan_fft(nx, FftDirection::Inverse),
            planner.plan_fft(ny, FftDirection::Inverse),
            planner.plan_fft(nz, FftDirection::Inverse),
        ];

        Self { nx, ny, nz, forward, inverse }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-place forward 3D FFT (no normalization)
    pub fn forward(&self, data: &mut [Complex<T>]) {
        self.process(data, &self.forward);
    }

    /// In-place inverse 3D FFT (no normalization)
    pub fn inverse(&self, data: &mut [Complex<T>]) {
        self.process(data, &self.inverse);
    }

    /// Unitary forward transform: scaled by 1/sqrt(N)
    pub fn forward_ortho(&self, data: &mut [Complex<T>]) {
        self.forward(data);
        self.scale(data);
    }

    /// Unitary inverse transform: scaled by 1/sqrt(N)
    pub fn inverse_ortho(&self, data: &mut [Complex<T>]) {
        self.inverse(data);
        self.scale(data);
    }

    fn scale(&self, data: &mut [Complex<T>]) {
        let s: T = scalar(1.0 / (self.len() as f64).sqrt());
        for val in data.iter_mut() {
            *val = *val * s;
        }
    }

    fn process(&self, data: &mut [Complex<T>], plans: &[Arc<dyn Fft<T>>; 3]) {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        debug_assert_eq!(data.len(), nx * ny * nz);

        let scratch_len = plans.iter().map(|p| p.get_inplace_scratch_len()).max().unwrap_or(0);
        let mut scratch = vec![Complex::<T>::zero(); scratch_len];

        // Transform along x-axis (contiguous)
        if nx > 1 {
            for k in 0..nz {
                for j in 0..ny {
                    let start = idx3d(0, j, k, nx, ny);
                    plans[0].process_with_scratch(&mut data[start..start + nx], &mut scratch);
                }
            }
        }

        // Transform along y-axis (stride nx)
        if ny > 1 {
            let mut buffer = vec![Complex::<T>::zero(); ny];
            for k in 0..nz {
                for i in 0..nx {
                    for j in 0..ny {
                        buffer[j] = data[idx3d(i, j, k, nx, ny)];
                    }
                    plans[1].process_with_scratch(&mut buffer, &mut scratch);
                    for j in 0..ny {
                        data[idx3d(i, j, k, nx, ny)] = buffer[j];
                    }
                }
            }
        }

        // Transform along z-axis (stride nx*ny)
        if nz > 1 {
            let mut buffer = vec![Complex::<T>::zero(); nz];
            for j in 0..ny {
                for i in 0..nx {
                    for k in 0..nz {
                        buffer[k] = data[idx3d(i, j, k, nx, ny)];
                    }
                    plans[2].process_with_scratch(&mut buffer, &mut scratch);
                    for k in 0..nz {
                        data[idx3d(i, j, k, nx, ny)] = buffer[k];
                    }
                }
            }
        }
    }
}

/// Convert an f64 constant into the plan's scalar type
#[inline]
pub(crate) fn scalar<T: FftNum>(v: f64) -> T {
    T::from_f64(v).unwrap_or_else(T::zero)
}

/// Index into a 3D array stored in Fortran order (column-major)
/// index = x + y*nx + z*nx*ny
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// Generate FFT frequency values for a given dimension
/// Matches numpy.fft.fftfreq(n, d)
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let val = 1.0 / (n as f64 * d);
    (0..n)
        .map(|i| {
            if i < (n + 1) / 2 {
                i as f64 * val
            } else {
                (i as i64 - n as i64) as f64 * val
            }
        })
        .collect()
}
