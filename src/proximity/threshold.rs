//! Weighted L1 (lasso) proximity operator

use num_complex::Complex64;

use super::{soft_threshold, ProximityOperator, Weights};
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct SparseThreshold {
    weights: Weights,
}

impl SparseThreshold {
    pub fn new(weights: Weights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: Weights) -> Result<()> {
        weights.validate()?;
        self.weights = weights;
        Ok(())
    }
}

impl ProximityOperator for SparseThreshold {
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64> {
        data.iter()
            .enumerate()
            .map(|(i, &x)| soft_threshold(x, self.weights.get(i) * extra_factor))
            .collect()
    }

    fn cost(&self, data: &[Complex64]) -> f64 {
        data.iter()
            .enumerate()
            .map(|(i, x)| self.weights.get(i) * x.norm())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::test_utils::random_complex;

    #[test]
    fn test_zero_weight_is_identity() {
        let prox = SparseThreshold::new(Weights::Scalar(0.0)).unwrap();
        let x = random_complex(32, 1);
        assert_eq!(prox.op(&x, 1.0), x);
    }

    #[test]
    fn test_large_weight_zeroes_everything() {
        let prox = SparseThreshold::new(Weights::Scalar(1e6)).unwrap();
        let x = random_complex(32, 2);
        assert!(prox.op(&x, 1.0).iter().all(|c| c.norm() == 0.0));
    }

    #[test]
    fn test_extra_factor_scales_threshold() {
        let prox = SparseThreshold::new(Weights::Scalar(0.5)).unwrap();
        let x = vec![Complex64::new(2.0, 0.0), Complex64::new(-0.8, 0.0)];
        let y = prox.op(&x, 2.0);
        assert!((y[0].re - 1.0).abs() < 1e-12);
        assert_eq!(y[1], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_cost_is_weighted_l1() {
        let prox = SparseThreshold::new(Weights::PerCoefficient(vec![1.0, 2.0])).unwrap();
        let x = vec![Complex64::new(3.0, 4.0), Complex64::new(0.0, -1.0)];
        assert!((prox.cost(&x) - 7.0).abs() < 1e-12);
    }
}
