//! Group-lasso and sparse-group-lasso proximity operators
//!
//! A group is the same coefficient index across every channel of a
//! channel-major stack.

use num_complex::Complex64;

use super::{ProximityOperator, SparseThreshold, Weights};
use crate::error::{ReconError, Result};

const EPS: f64 = f32::EPSILON as f64;

#[derive(Clone, Debug)]
pub struct GroupLasso {
    weights: Weights,
    n_channels: usize,
}

impl GroupLasso {
    /// `weights` are per group (coefficient index) or scalar
    pub fn new(weights: Weights, n_channels: usize) -> Result<Self> {
        weights.validate()?;
        if n_channels == 0 {
            return Err(ReconError::InvalidParameter("n_channels must be at least 1".into()));
        }
        Ok(Self { weights, n_channels })
    }

    fn group_norms(&self, data: &[Complex64]) -> Vec<f64> {
        let n = data.len() / self.n_channels;
        (0..n)
            .map(|i| {
                (0..self.n_channels)
                    .map(|c| data[c * n + i].norm_sqr())
                    .sum::<f64>()
                    .sqrt()
            })
            .collect()
    }
}

impl ProximityOperator for GroupLasso {
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64> {
        let n = data.len() / self.n_channels;
        let norms = self.group_norms(data);
        let mut out = data.to_vec();
        for (i, &norm) in norms.iter().enumerate() {
            let scale = (1.0 - self.weights.get(i) * extra_factor / norm.max(EPS)).max(0.0);
            for c in 0..self.n_channels {
                out[c * n + i] *= scale;
            }
        }
        out
    }

    fn cost(&self, data: &[Complex64]) -> f64 {
        self.group_norms(data).iter().sum()
    }
}

/// Lasso prox followed by the group-lasso prox.
///
/// This two-step composition is not the exact joint proximal operator of
/// the sum of both penalties.
#[derive(Clone, Debug)]
pub struct SparseGroupLasso {
    l1: SparseThreshold,
    l2: GroupLasso,
}

impl SparseGroupLasso {
    pub fn new(weights_l1: Weights, weights_l2: Weights, n_channels: usize) -> Result<Self> {
        Ok(Self {
            l1: SparseThreshold::new(weights_l1)?,
            l2: GroupLasso::new(weights_l2, n_channels)?,
        })
    }
}

impl ProximityOperator for SparseGroupLasso {
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64> {
        self.l2.op(&self.l1.op(data, extra_factor), extra_factor)
    }

    fn cost(&self, data: &[Complex64]) -> f64 {
        self.l1.cost(data) + self.l2.cost(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_shrinkage() {
        // Two channels, two groups: group 0 = (3, 4), group 1 = (0.3, 0.4)
        let data = vec![
            Complex64::new(3.0, 0.0), Complex64::new(0.3, 0.0),
            Complex64::new(4.0, 0.0), Complex64::new(0.4, 0.0),
        ];
        let prox = GroupLasso::new(Weights::Scalar(1.0), 2).unwrap();
        let out = prox.op(&data, 1.0);

        // Norm 5 shrinks to 4, direction preserved
        assert!((out[0].re - 2.4).abs() < 1e-12);
        assert!((out[2].re - 3.2).abs() < 1e-12);
        // Norm 0.5 < 1: whole group zeroed
        assert_eq!(out[1], Complex64::new(0.0, 0.0));
        assert_eq!(out[3], Complex64::new(0.0, 0.0));

        assert!((prox.cost(&data) - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_sparse_group_lasso_composition() {
        let data = vec![Complex64::new(3.0, 0.0), Complex64::new(5.0, 0.0)];
        let sgl = SparseGroupLasso::new(Weights::Scalar(1.0), Weights::Scalar(1.0), 1).unwrap();
        let out = sgl.op(&data, 1.0);
        // Lasso: (2, 4); group of one element: (1, 3)
        assert!((out[0].re - 1.0).abs() < 1e-12);
        assert!((out[1].re - 3.0).abs() < 1e-12);
    }
}
