//! Data-fidelity gradients
//!
//! Both operators minimize `0.5 * ||M x - y||^2` over multi-channel data:
//! - `GradAnalysis`: `x` is a channel-major image stack, `M = F` per channel.
//! - `GradSynthesis`: `x` is a channel-major coefficient stack,
//!   `M = F W^H` per channel.
//!
//! The Lipschitz constant of the gradient (`spec_rad`) is estimated once at
//! construction with the power method on `M^H M`.

use num_complex::Complex64;

use crate::error::{ReconError, Result};
use crate::fourier::FourierOperator;
use crate::linear::LinearOperator;
use crate::solvers::power::power_method;

const POWER_MAX_ITER: usize = 200;
const POWER_TOL: f64 = 1e-6;

pub trait GradientOperator {
    /// Gradient of the data-fidelity term at `x`
    fn get_grad(&self, x: &[Complex64]) -> Vec<Complex64>;

    /// `0.5 * ||M x - y||^2`
    fn cost(&self, x: &[Complex64]) -> f64;

    /// Lipschitz constant of the gradient
    fn spec_rad(&self) -> f64;

    fn inv_spec_rad(&self) -> f64 {
        let l = self.spec_rad();
        if l > 0.0 { 1.0 / l } else { 1.0 }
    }

    /// `M^H y`, the usual starting point of a reconstruction
    fn initial_point(&self) -> Vec<Complex64>;

    /// Number of channels in the data
    fn n_channels(&self) -> usize;

    /// Length of the optimization variable
    fn variable_len(&self) -> usize;
}

fn check_data(data: &[Complex64], n_samples: usize, n_channels: usize) -> Result<()> {
    if n_channels == 0 {
        return Err(ReconError::InvalidParameter("n_channels must be at least 1".into()));
    }
    if data.len() != n_samples * n_channels {
        return Err(ReconError::DimensionMismatch {
            expected: n_samples * n_channels,
            got: data.len(),
        });
    }
    Ok(())
}

fn residual_norm_sqr(model: &[Complex64], data: &[Complex64]) -> f64 {
    model.iter().zip(data.iter()).map(|(m, y)| (m - y).norm_sqr()).sum()
}

/// Gradient in image space
pub struct GradAnalysis<'a> {
    fourier: &'a dyn FourierOperator,
    data: &'a [Complex64],
    n_channels: usize,
    spec_rad: f64,
}

impl<'a> GradAnalysis<'a> {
    /// # Arguments
    /// * `data` - Channel-major k-space samples (n_channels * n_samples)
    /// * `fourier` - Fourier operator shared by every channel
    /// * `n_channels` - Number of receive channels
    pub fn new(data: &'a [Complex64], fourier: &'a dyn FourierOperator, n_channels: usize) -> Result<Self> {
        check_data(data, fourier.n_samples(), n_channels)?;
        let spec_rad = power_method(
            |x| fourier.adj_op(&fourier.op(x)),
            fourier.image_len(),
            POWER_MAX_ITER,
            POWER_TOL,
        );
        tracing::debug!(spec_rad, n_channels, "analysis gradient ready");
        Ok(Self { fourier, data, n_channels, spec_rad })
    }

    pub fn fourier(&self) -> &dyn FourierOperator {
        self.fourier
    }

    fn model(&self, x: &[Complex64]) -> Vec<Complex64> {
        let n = self.fourier.image_len();
        x.chunks(n).flat_map(|img| self.fourier.op(img)).collect()
    }
}

impl GradientOperator for GradAnalysis<'_> {
    fn get_grad(&self, x: &[Complex64]) -> Vec<Complex64> {
        let n = self.fourier.image_len();
        let m = self.fourier.n_samples();
        let mut grad = Vec::with_capacity(x.len());
        for (img, y) in x.chunks(n).zip(self.data.chunks(m)) {
            let residual: Vec<Complex64> = self
                .fourier
                .op(img)
                .iter()
                .zip(y.iter())
                .map(|(a, b)| a - b)
                .collect();
            grad.extend(self.fourier.adj_op(&residual));
        }
        grad
    }

    fn cost(&self, x: &[Complex64]) -> f64 {
        0.5 * residual_norm_sqr(&self.model(x), self.data)
    }

    fn spec_rad(&self) -> f64 {
        self.spec_rad
    }

    fn initial_point(&self) -> Vec<Complex64> {
        let m = self.fourier.n_samples();
        self.data.chunks(m).flat_map(|y| self.fourier.adj_op(y)).collect()
    }

    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn variable_len(&self) -> usize {
        self.n_channels * self.fourier.image_len()
    }
}

/// Gradient in coefficient space
pub struct GradSynthesis<'a> {
    fourier: &'a dyn FourierOperator,
    linear: &'a dyn LinearOperator,
    data: &'a [Complex64],
    n_channels: usize,
    spec_rad: f64,
}

impl<'a> GradSynthesis<'a> {
    pub fn new(
        data: &'a [Complex64],
        fourier: &'a dyn FourierOperator,
        linear: &'a dyn LinearOperator,
        n_channels: usize,
    ) -> Result<Self> {
        check_data(data, fourier.n_samples(), n_channels)?;
        if linear.image_len() != fourier.image_len() {
            return Err(ReconError::DimensionMismatch {
                expected: fourier.image_len(),
                got: linear.image_len(),
            });
        }
        let spec_rad = power_method(
            |alpha| linear.op(&fourier.adj_op(&fourier.op(&linear.adj_op(alpha)))),
            linear.n_coeffs(),
            POWER_MAX_ITER,
            POWER_TOL,
        );
        tracing::debug!(spec_rad, n_channels, "synthesis gradient ready");
        Ok(Self { fourier, linear, data, n_channels, spec_rad })
    }

    pub fn linear(&self) -> &dyn LinearOperator {
        self.linear
    }

    fn model(&self, alpha: &[Complex64]) -> Vec<Complex64> {
        let n = self.linear.n_coeffs();
        alpha
            .chunks(n)
            .flat_map(|c| self.fourier.op(&self.linear.adj_op(c)))
            .collect()
    }
}

impl GradientOperator for GradSynthesis<'_> {
    fn get_grad(&self, alpha: &[Complex64]) -> Vec<Complex64> {
        let n = self.linear.n_coeffs();
        let m = self.fourier.n_samples();
        let mut grad = Vec::with_capacity(alpha.len());
        for (c, y) in alpha.chunks(n).zip(self.data.chunks(m)) {
            let residual: Vec<Complex64> = self
                .fourier
                .op(&self.linear.adj_op(c))
                .iter()
                .zip(y.iter())
                .map(|(a, b)| a - b)
                .collect();
            grad.extend(self.linear.op(&self.fourier.adj_op(&residual)));
        }
        grad
    }

    fn cost(&self, alpha: &[Complex64]) -> f64 {
        0.5 * residual_norm_sqr(&self.model(alpha), self.data)
    }

    fn spec_rad(&self) -> f64 {
        self.spec_rad
    }

    fn initial_point(&self) -> Vec<Complex64> {
        let m = self.fourier.n_samples();
        self.data
            .chunks(m)
            .flat_map(|y| self.linear.op(&self.fourier.adj_op(y)))
            .collect()
    }

    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn variable_len(&self) -> usize {
        self.n_channels * self.linear.n_coeffs()
    }
}
