//! Proximity operators
//!
//! Every regularizer exposes `op(x, extra_factor)`, the proximal map of the
//! regularizer scaled by `extra_factor` (the solver step size), and `cost(x)`,
//! the value of the regularization term used for cost traces.
//!
//! Multi-channel inputs are channel-major. Operators that couple channels
//! (group-lasso, OWL, nuclear norm) take the channel count at construction.

pub mod elastic_net;
pub mod group_lasso;
pub mod ksupport;
pub mod nuclear;
pub mod owl;
pub mod positivity;
pub mod threshold;

pub use elastic_net::*;
pub use group_lasso::*;
pub use ksupport::*;
pub use nuclear::*;
pub use owl::*;
pub use positivity::*;
pub use threshold::*;

use num_complex::Complex64;

use crate::error::{ReconError, Result};

pub trait ProximityOperator {
    /// Proximal map at step `extra_factor`
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64>;

    /// Value of the regularization term
    fn cost(&self, data: &[Complex64]) -> f64;
}

/// Regularization strength
///
/// `PerCoefficient` weights are indexed modulo their length, so weights
/// defined for one channel apply to every channel of a stack.
#[derive(Clone, Debug, PartialEq)]
pub enum Weights {
    Scalar(f64),
    PerCoefficient(Vec<f64>),
}

impl Weights {
    pub fn scalar(w: f64) -> Result<Self> {
        let weights = Weights::Scalar(w);
        weights.validate()?;
        Ok(weights)
    }

    pub fn per_coefficient(w: Vec<f64>) -> Result<Self> {
        let weights = Weights::PerCoefficient(w);
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        let ok = match self {
            Weights::Scalar(w) => *w >= 0.0,
            Weights::PerCoefficient(w) => !w.is_empty() && w.iter().all(|&v| v >= 0.0),
        };
        if ok { Ok(()) } else { Err(ReconError::NegativeWeight) }
    }

    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        match self {
            Weights::Scalar(w) => *w,
            Weights::PerCoefficient(w) => w[i % w.len()],
        }
    }

    /// Weights expanded to `n` values
    pub fn to_vec(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.get(i)).collect()
    }
}

/// Proximity operator of the zero function
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityProx;

impl ProximityOperator for IdentityProx {
    fn op(&self, data: &[Complex64], _extra_factor: f64) -> Vec<Complex64> {
        data.to_vec()
    }

    fn cost(&self, _data: &[Complex64]) -> f64 {
        0.0
    }
}

/// Complex soft threshold: shrink the magnitude by `t`, keep the phase
#[inline]
pub(crate) fn soft_threshold(x: Complex64, t: f64) -> Complex64 {
    let mag = x.norm();
    if mag <= t || mag == 0.0 {
        Complex64::new(0.0, 0.0)
    } else {
        x * (1.0 - t / mag)
    }
}

pub(crate) fn l2_norm(data: &[Complex64]) -> f64 {
    data.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt()
}
