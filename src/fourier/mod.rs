//! Fourier operators mapping an image to k-space samples and back
//!
//! - `CartesianFft`: masked FFT on the regular grid
//! - `Ndft`: direct non-uniform DFT evaluated from precomputed phase tables
//! - `Nufft`: gridding NUFFT with an oversampled grid and platform selection
//!
//! Every operator is energy-normalized so that `adj_op` is the conjugate
//! transpose of `op`.

pub mod cartesian;
pub mod ndft;
pub mod nufft;
pub mod trajectory;

pub use cartesian::*;
pub use ndft::*;
pub use nufft::*;
pub use trajectory::*;

use num_complex::Complex64;

/// Forward/adjoint pair between image space and k-space samples
pub trait FourierOperator: Sync {
    /// Image (nx * ny * nz) -> k-space samples
    fn op(&self, img: &[Complex64]) -> Vec<Complex64>;

    /// k-space samples -> image (nx * ny * nz)
    fn adj_op(&self, samples: &[Complex64]) -> Vec<Complex64>;

    /// Image dimensions (nx, ny, nz)
    fn shape(&self) -> (usize, usize, usize);

    /// Number of values produced by `op`
    fn n_samples(&self) -> usize;

    fn image_len(&self) -> usize {
        let (nx, ny, nz) = self.shape();
        nx * ny * nz
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    pub fn random_complex(n: usize, seed: u64) -> Vec<Complex64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect()
    }

    /// <a, b> with the conjugate on the second argument
    pub fn inner(a: &[Complex64], b: &[Complex64]) -> Complex64 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y.conj()).sum()
    }
}
