//! Orthonormal Haar wavelet transform
//!
//! Separable multiscale decomposition over every axis of length > 1.
//! Each level splits the current approximation into `2^d` sub-bands
//! (`d` = number of transformed axes): band 0 is the next approximation, and
//! band `b` is high-pass along the axes whose bit is set in `b`.
//!
//! Output order: coarsest approximation, then the detail bands of each level
//! from the coarsest level to the finest. The transform is orthonormal, so
//! `adj_op` is also the inverse.

use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

use super::{BandShape, LinearOperator};
use crate::error::{ReconError, Result};
use crate::fft::idx3d;

pub struct HaarWavelet {
    shape: (usize, usize, usize),
    nb_scale: usize,
    /// Transformed axes (length > 1)
    axes: Vec<usize>,
    /// Dimensions of the approximation entering each level
    level_dims: Vec<[usize; 3]>,
    bands: Vec<BandShape>,
}

impl HaarWavelet {
    pub fn new(nx: usize, ny: usize, nz: usize, nb_scale: usize) -> Result<Self> {
        let dims = [nx, ny, nz];
        if nb_scale == 0 {
            return Err(ReconError::InvalidScale { len: nx, nb_scale });
        }
        let axes: Vec<usize> = (0..3).filter(|&a| dims[a] > 1).collect();
        let factor = 1usize
            .checked_shl(nb_scale as u32)
            .ok_or(ReconError::InvalidScale { len: nx, nb_scale })?;
        for &a in &axes {
            if dims[a] % factor != 0 {
                return Err(ReconError::InvalidScale { len: dims[a], nb_scale });
            }
        }

        let mut level_dims = Vec::with_capacity(nb_scale);
        let mut current = dims;
        for _ in 0..nb_scale {
            level_dims.push(current);
            for &a in &axes {
                current[a] /= 2;
            }
        }

        let n_details = (1usize << axes.len()) - 1;
        let mut bands = vec![BandShape::new(current[0], current[1], current[2])];
        for level in (0..nb_scale).rev() {
            let mut half = level_dims[level];
            for &a in &axes {
                half[a] /= 2;
            }
            for _ in 0..n_details {
                bands.push(BandShape::new(half[0], half[1], half[2]));
            }
        }

        Ok(Self { shape: (nx, ny, nz), nb_scale, axes, level_dims, bands })
    }

    pub fn nb_scale(&self) -> usize {
        self.nb_scale
    }

    fn half(&self, dims: [usize; 3]) -> [usize; 3] {
        let mut half = dims;
        for &a in &self.axes {
            half[a] /= 2;
        }
        half
    }

    /// Sub-band that a voxel of the Mallat layout belongs to
    fn band_of(&self, pos: [usize; 3], half: [usize; 3]) -> usize {
        self.axes
            .iter()
            .enumerate()
            .filter(|&(_, &a)| pos[a] >= half[a])
            .fold(0, |b, (bit, _)| b | (1 << bit))
    }
}

/// One Haar step along `axis` for every line of the buffer.
/// Forward writes low-pass into the first half and high-pass into the second.
fn haar_axis(buf: &mut [Complex64], dims: [usize; 3], axis: usize, inverse: bool) {
    let [nx, ny, nz] = dims;
    let n = dims[axis];
    let h = n / 2;
    let mut line = vec![Complex64::new(0.0, 0.0); n];
    let mut out = vec![Complex64::new(0.0, 0.0); n];

    let (outer_a, outer_b) = match axis {
        0 => (ny, nz),
        1 => (nx, nz),
        _ => (nx, ny),
    };
    let index = |t: usize, p: usize, q: usize| match axis {
        0 => idx3d(t, p, q, nx, ny),
        1 => idx3d(p, t, q, nx, ny),
        _ => idx3d(p, q, t, nx, ny),
    };

    for q in 0..outer_b {
        for p in 0..outer_a {
            for t in 0..n {
                line[t] = buf[index(t, p, q)];
            }
            if inverse {
                for i in 0..h {
                    let (a, d) = (line[i], line[h + i]);
                    out[2 * i] = (a + d) * FRAC_1_SQRT_2;
                    out[2 * i + 1] = (a - d) * FRAC_1_SQRT_2;
                }
            } else {
                for i in 0..h {
                    let (a, b) = (line[2 * i], line[2 * i + 1]);
                    out[i] = (a + b) * FRAC_1_SQRT_2;
                    out[h + i] = (a - b) * FRAC_1_SQRT_2;
                }
            }
            for t in 0..n {
                buf[index(t, p, q)] = out[t];
            }
        }
    }
}

impl LinearOperator for HaarWavelet {
    fn op(&self, img: &[Complex64]) -> Vec<Complex64> {
        let n_bands = 1usize << self.axes.len();
        let mut approx = img.to_vec();
        // details[level] holds the detail bands of that level, finest first
        let mut details: Vec<Vec<Vec<Complex64>>> = Vec::with_capacity(self.nb_scale);

        for &dims in &self.level_dims {
            for &a in &self.axes {
                haar_axis(&mut approx, dims, a, false);
            }

            let half = self.half(dims);
            let band_len = half[0] * half[1] * half[2];
            let mut split = vec![Vec::with_capacity(band_len); n_bands];
            for k in 0..dims[2] {
                for j in 0..dims[1] {
                    for i in 0..dims[0] {
                        let b = self.band_of([i, j, k], half);
                        split[b].push(approx[idx3d(i, j, k, dims[0], dims[1])]);
                    }
                }
            }

            approx = std::mem::take(&mut split[0]);
            split.remove(0);
            details.push(split);
        }

        let mut coeffs = Vec::with_capacity(img.len());
        coeffs.extend(approx);
        for level in details.into_iter().rev() {
            for band in level {
                coeffs.extend(band);
            }
        }
        coeffs
    }

    fn adj_op(&self, coeffs: &[Complex64]) -> Vec<Complex64> {
        let n_details = (1usize << self.axes.len()) - 1;
        let coarse_len = self.bands[0].len();
        let mut approx = coeffs[..coarse_len].to_vec();
        let mut offset = coarse_len;

        for &dims in self.level_dims.iter().rev() {
            let half = self.half(dims);
            let band_len = half[0] * half[1] * half[2];

            let mut cursors = vec![0usize; n_details + 1];
            let mut buf = vec![Complex64::new(0.0, 0.0); dims[0] * dims[1] * dims[2]];
            for k in 0..dims[2] {
                for j in 0..dims[1] {
                    for i in 0..dims[0] {
                        let b = self.band_of([i, j, k], half);
                        let value = if b == 0 {
                            approx[cursors[0]]
                        } else {
                            coeffs[offset + (b - 1) * band_len + cursors[b]]
                        };
                        cursors[b] += 1;
                        buf[idx3d(i, j, k, dims[0], dims[1])] = value;
                    }
                }
            }
            offset += n_details * band_len;

            for &a in self.axes.iter().rev() {
                haar_axis(&mut buf, dims, a, true);
            }
            approx = buf;
        }
        approx
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::test_utils::{inner, random_complex};
    use crate::linear::{flatten, unflatten};

    #[test]
    fn test_band_layout_2d() {
        let haar = HaarWavelet::new(8, 8, 1, 2).unwrap();
        let shapes = haar.coeffs_shape();
        // approx + 3 details at 2x2, then 3 details at 4x4
        assert_eq!(shapes.len(), 7);
        assert_eq!(shapes[0], BandShape::new(2, 2, 1));
        assert_eq!(shapes[1], BandShape::new(2, 2, 1));
        assert_eq!(shapes[6], BandShape::new(4, 4, 1));
        assert_eq!(haar.n_coeffs(), 64);
    }

    #[test]
    fn test_perfect_reconstruction() {
        let haar = HaarWavelet::new(8, 4, 1, 2).unwrap();
        let x = random_complex(32, 1);
        let back = haar.adj_op(&haar.op(&x));
        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_perfect_reconstruction_3d() {
        let haar = HaarWavelet::new(4, 4, 4, 1).unwrap();
        assert_eq!(haar.coeffs_shape().len(), 8);
        let x = random_complex(64, 2);
        let back = haar.adj_op(&haar.op(&x));
        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_adjointness() {
        let haar = HaarWavelet::new(8, 8, 1, 3).unwrap();
        let x = random_complex(64, 3);
        let y = random_complex(64, 4);

        let lhs = inner(&haar.op(&x), &y);
        let rhs = inner(&x, &haar.adj_op(&y));
        assert!((lhs - rhs).norm() < 1e-10);
    }

    #[test]
    fn test_constant_image_has_no_details() {
        let haar = HaarWavelet::new(4, 4, 1, 2).unwrap();
        let coeffs = haar.op(&vec![Complex64::new(1.0, 0.0); 16]);
        let bands = unflatten(&coeffs, haar.coeffs_shape()).unwrap();

        // Single approximation coefficient carrying all the energy
        assert!((bands[0].data[0].re - 4.0).abs() < 1e-12);
        for band in &bands[1..] {
            assert!(band.data.iter().all(|c| c.norm() < 1e-12));
        }

        let (flat, _) = flatten(&bands);
        assert_eq!(flat, coeffs);
    }

    #[test]
    fn test_invalid_scale() {
        assert!(matches!(
            HaarWavelet::new(12, 8, 1, 3),
            Err(ReconError::InvalidScale { len: 12, nb_scale: 3 })
        ));
        assert!(HaarWavelet::new(8, 8, 1, 0).is_err());
    }

    #[test]
    fn test_norm_is_one() {
        let haar = HaarWavelet::new(8, 8, 1, 2).unwrap();
        let estimated = power_norm(&haar);
        assert!((estimated - 1.0).abs() < 1e-6);
    }

    fn power_norm(op: &dyn LinearOperator) -> f64 {
        crate::solvers::power::power_method(|x| op.adj_op(&op.op(x)), op.image_len(), 50, 1e-9).sqrt()
    }
}
