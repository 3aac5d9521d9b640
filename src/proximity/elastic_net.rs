//! Elastic-net proximity operator
//!
//! Lasso soft threshold followed by the ridge shrinkage
//! `1 / (1 + 2 * w_ridge * w_lasso)`.

use num_complex::Complex64;

use super::{l2_norm, ProximityOperator, SparseThreshold, Weights};
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct ElasticNet {
    lasso: SparseThreshold,
    weights_lasso: Weights,
    weights_ridge: Weights,
}

impl ElasticNet {
    pub fn new(weights_lasso: Weights, weights_ridge: Weights) -> Result<Self> {
        weights_ridge.validate()?;
        Ok(Self {
            lasso: SparseThreshold::new(weights_lasso.clone())?,
            weights_lasso,
            weights_ridge,
        })
    }
}

impl ProximityOperator for ElasticNet {
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64> {
        let mut out = self.lasso.op(data, extra_factor);
        for (i, v) in out.iter_mut().enumerate() {
            *v /= 1.0 + 2.0 * self.weights_ridge.get(i) * self.weights_lasso.get(i);
        }
        out
    }

    fn cost(&self, data: &[Complex64]) -> f64 {
        match (&self.weights_lasso, &self.weights_ridge) {
            (Weights::Scalar(wl), Weights::Scalar(wr)) => {
                wl * data.iter().map(|c| c.norm()).sum::<f64>() + wr * l2_norm(data)
            }
            _ => {
                let l1: f64 = data
                    .iter()
                    .enumerate()
                    .map(|(i, c)| self.weights_lasso.get(i) * c.norm())
                    .sum();
                let l2 = data
                    .iter()
                    .enumerate()
                    .map(|(i, c)| self.weights_ridge.get(i) * c.norm_sqr())
                    .sum::<f64>()
                    .sqrt();
                l1 + l2
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_then_shrink() {
        let prox = ElasticNet::new(Weights::Scalar(0.5), Weights::Scalar(1.0)).unwrap();
        let x = vec![Complex64::new(3.0, 0.0), Complex64::new(0.2, 0.0)];
        let y = prox.op(&x, 1.0);
        // (3 - 0.5) / (1 + 2 * 1 * 0.5)
        assert!((y[0].re - 1.25).abs() < 1e-12);
        assert_eq!(y[1], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_cost() {
        let prox = ElasticNet::new(Weights::Scalar(1.0), Weights::Scalar(2.0)).unwrap();
        let x = vec![Complex64::new(3.0, 0.0), Complex64::new(0.0, 4.0)];
        assert!((prox.cost(&x) - (7.0 + 2.0 * 5.0)).abs() < 1e-12);
    }
}
