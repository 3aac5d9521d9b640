//! Patch extraction and reconstruction
//!
//! Patches of a fixed shape are taken on a regular grid with step
//! `patch / overlap` along each axis. Reconstruction accumulates every patch
//! back into place and divides by the number of patches covering each voxel,
//! so non-overlapping patches tile the image exactly and overlapping ones are
//! averaged.

use num_complex::Complex64;

use crate::error::{ReconError, Result};
use crate::fft::idx3d;

#[derive(Clone, Debug)]
pub struct PatchGrid {
    dims: [usize; 3],
    patch: [usize; 3],
    origins: Vec<[usize; 3]>,
    /// Number of patches covering each voxel
    coverage: Vec<u32>,
}

impl PatchGrid {
    /// # Arguments
    /// * `shape` - Image dimensions (nx, ny, nz)
    /// * `patch_shape` - Patch dimensions; use 1 along unused axes
    /// * `overlap` - Overlap factor; 1 = non-overlapping
    pub fn new(shape: (usize, usize, usize), patch_shape: (usize, usize, usize), overlap: usize) -> Result<Self> {
        let dims = [shape.0, shape.1, shape.2];
        let patch = [patch_shape.0, patch_shape.1, patch_shape.2];
        if overlap == 0 {
            return Err(ReconError::PatchLayout("overlap factor must be at least 1".into()));
        }

        let mut steps = [1usize; 3];
        for a in 0..3 {
            if patch[a] == 0 || patch[a] > dims[a] {
                return Err(ReconError::PatchLayout(format!(
                    "patch size {} does not fit axis of length {}",
                    patch[a], dims[a]
                )));
            }
            if patch[a] > 1 {
                if patch[a] % overlap != 0 {
                    return Err(ReconError::PatchLayout(format!(
                        "patch size {} is not divisible by the overlap factor {}",
                        patch[a], overlap
                    )));
                }
                steps[a] = patch[a] / overlap;
            }
            if (dims[a] - patch[a]) % steps[a] != 0 {
                return Err(ReconError::PatchLayout(format!(
                    "axis of length {} is not covered by patches of {} with step {}",
                    dims[a], patch[a], steps[a]
                )));
            }
        }

        let mut origins = Vec::new();
        for k in (0..=dims[2] - patch[2]).step_by(steps[2]) {
            for j in (0..=dims[1] - patch[1]).step_by(steps[1]) {
                for i in (0..=dims[0] - patch[0]).step_by(steps[0]) {
                    origins.push([i, j, k]);
                }
            }
        }

        let mut coverage = vec![0u32; dims[0] * dims[1] * dims[2]];
        for origin in &origins {
            for_each_voxel(dims, patch, *origin, |_, idx| coverage[idx] += 1);
        }

        Ok(Self { dims, patch, origins, coverage })
    }

    pub fn n_patches(&self) -> usize {
        self.origins.len()
    }

    pub fn patch_len(&self) -> usize {
        self.patch.iter().product()
    }

    pub fn image_len(&self) -> usize {
        self.dims.iter().product()
    }

    /// Copy patch `p` out of `img` (Fortran order within the patch)
    pub fn extract(&self, img: &[Complex64], p: usize) -> Vec<Complex64> {
        let mut out = vec![Complex64::new(0.0, 0.0); self.patch_len()];
        for_each_voxel(self.dims, self.patch, self.origins[p], |local, idx| out[local] = img[idx]);
        out
    }

    /// All patches of `img`
    pub fn extract_all(&self, img: &[Complex64]) -> Vec<Vec<Complex64>> {
        (0..self.n_patches()).map(|p| self.extract(img, p)).collect()
    }

    /// Assemble patches (one per origin, in order) into an image,
    /// averaging where they overlap
    pub fn reconstruct(&self, patches: &[Vec<Complex64>]) -> Vec<Complex64> {
        let mut img = vec![Complex64::new(0.0, 0.0); self.image_len()];
        for (origin, patch) in self.origins.iter().zip(patches.iter()) {
            for_each_voxel(self.dims, self.patch, *origin, |local, idx| img[idx] += patch[local]);
        }
        for (v, &c) in img.iter_mut().zip(self.coverage.iter()) {
            if c > 0 {
                *v /= c as f64;
            }
        }
        img
    }
}

/// Visit every voxel of the patch at `origin` as (index in patch, index in image)
fn for_each_voxel<F: FnMut(usize, usize)>(dims: [usize; 3], patch: [usize; 3], origin: [usize; 3], mut f: F) {
    let mut local = 0;
    for k in 0..patch[2] {
        for j in 0..patch[1] {
            for i in 0..patch[0] {
                f(local, idx3d(origin[0] + i, origin[1] + j, origin[2] + k, dims[0], dims[1]));
                local += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::test_utils::random_complex;

    #[test]
    fn test_non_overlapping_roundtrip() {
        let grid = PatchGrid::new((8, 8, 1), (4, 4, 1), 1).unwrap();
        assert_eq!(grid.n_patches(), 4);

        let img = random_complex(64, 1);
        let back = grid.reconstruct(&grid.extract_all(&img));
        assert_eq!(back, img);
    }

    #[test]
    fn test_overlapping_roundtrip() {
        let grid = PatchGrid::new((8, 8, 1), (4, 4, 1), 2).unwrap();
        // step 2 along x and y: 3 x 3 patches
        assert_eq!(grid.n_patches(), 9);

        let img = random_complex(64, 2);
        let back = grid.reconstruct(&grid.extract_all(&img));
        for (a, b) in img.iter().zip(back.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_overlap_averages_contributions() {
        let grid = PatchGrid::new((4, 1, 1), (2, 1, 1), 2).unwrap();
        assert_eq!(grid.n_patches(), 3);

        let patches: Vec<Vec<Complex64>> = (0..3)
            .map(|p| vec![Complex64::new(p as f64, 0.0); 2])
            .collect();
        let img = grid.reconstruct(&patches);
        let expected = [0.0, 0.5, 1.5, 2.0];
        for (v, e) in img.iter().zip(expected.iter()) {
            assert!((v.re - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_uncovered_shape_is_rejected() {
        assert!(matches!(
            PatchGrid::new((10, 8, 1), (4, 4, 1), 1),
            Err(ReconError::PatchLayout(_))
        ));
        assert!(PatchGrid::new((8, 8, 1), (3, 4, 1), 2).is_err());
        assert!(PatchGrid::new((8, 8, 1), (16, 4, 1), 1).is_err());
    }
}
