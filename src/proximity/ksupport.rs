//! Squared k-support norm proximity operator
//!
//! Algorithm 1 of McDonald, Pontil & Stamos (JMLR 2016). For a scalar
//! `alpha`, each coordinate gets
//!
//! `theta_i(alpha) = clip(alpha * |w_i| - 2 * lambda, 0, 1)`
//!
//! and `alpha*` is chosen so that `sum_i theta_i = k`. Since the sum is
//! piecewise linear in `alpha`, `alpha*` is found by a binary search over the
//! breakpoints `2 * lambda / |w_i|` and `(2 * lambda + 1) / |w_i|`, followed by
//! linear interpolation between the bracketing pair. The prox is then
//! `w_i * theta_i / (theta_i + 2 * lambda)`.
//!
//! k = 1 gives the squared L1 norm, k = dimension the squared L2 norm.

use num_complex::Complex64;

use super::ProximityOperator;
use crate::error::{ReconError, Result};

const MAX_SEARCH_ITER: usize = 200;

#[derive(Clone, Debug)]
pub struct KSupportNorm {
    k: usize,
    lambda: f64,
}

impl KSupportNorm {
    pub fn new(k: usize, lambda: f64) -> Result<Self> {
        if k == 0 {
            return Err(ReconError::InvalidParameter("k must be at least 1".into()));
        }
        if lambda < 0.0 {
            return Err(ReconError::NegativeWeight);
        }
        Ok(Self { k, lambda })
    }

    fn theta(abs: &[f64], alpha: f64, shift: f64) -> Vec<f64> {
        abs.iter().map(|&a| (alpha * a - shift).clamp(0.0, 1.0)).collect()
    }

    fn active_sum(abs: &[f64], alpha: f64, shift: f64) -> f64 {
        abs.iter().map(|&a| (alpha * a - shift).clamp(0.0, 1.0)).sum()
    }

    /// Find `alpha` with `sum_i theta_i(alpha) = k`.
    ///
    /// Returns `None` when the breakpoints do not bracket `k` within the
    /// search budget.
    pub fn find_alpha(&self, abs: &[f64], extra_factor: f64) -> Option<f64> {
        let shift = 2.0 * self.lambda * extra_factor;
        let k = self.k as f64;

        let mut alphas: Vec<f64> = abs
            .iter()
            .filter(|&&a| a > 0.0)
            .flat_map(|&a| [shift / a, (shift + 1.0) / a])
            .filter(|a| a.is_finite())
            .collect();
        if alphas.is_empty() {
            return None;
        }
        alphas.sort_by(|a, b| a.total_cmp(b));
        alphas.dedup();

        let last = alphas.len() - 1;
        let sum_max = Self::active_sum(abs, alphas[last], shift);
        if sum_max <= k {
            // Every non-zero coordinate saturates
            return Some(alphas[last]);
        }
        let sum_min = Self::active_sum(abs, alphas[0], shift);
        if sum_min >= k {
            return Some(alphas[0]);
        }

        // Invariant: sum(lo) < k < sum(hi)
        let (mut lo, mut hi) = (0, last);
        let mut iter = 0;
        while hi - lo > 1 {
            if iter == MAX_SEARCH_ITER {
                return None;
            }
            iter += 1;

            let mid = (lo + hi) / 2;
            let s = Self::active_sum(abs, alphas[mid], shift);
            if s == k {
                return Some(alphas[mid]);
            } else if s < k {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let s0 = Self::active_sum(abs, alphas[lo], shift);
        let s1 = Self::active_sum(abs, alphas[hi], shift);
        if !(s0 <= k && k <= s1) {
            return None;
        }
        Some(interpolate(alphas[lo], alphas[hi], s0, s1, k))
    }

    /// Squared k-support norm of the magnitudes (Argyriou et al. 2012)
    fn squared_norm(&self, abs: &[f64]) -> f64 {
        let mut sorted = abs.to_vec();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let d = sorted.len();
        if d == 0 {
            return 0.0;
        }
        let k = self.k.min(d);

        // Find r in 0..k with |w|_{k-r-1} > tail / (r + 1) >= |w|_{k-r} (1-based)
        let mut r = k - 1;
        for cand in 0..k {
            let tail: f64 = sorted[k - cand - 1..].iter().sum();
            let avg = tail / (cand + 1) as f64;
            let upper = if k - cand >= 2 { sorted[k - cand - 2] } else { f64::INFINITY };
            if upper > avg && avg >= sorted[k - cand - 1] {
                r = cand;
                break;
            }
        }

        let head: f64 = sorted[..k - r - 1].iter().map(|a| a * a).sum();
        let tail: f64 = sorted[k - r - 1..].iter().sum();
        head + tail * tail / (r + 1) as f64
    }
}

/// Linear interpolation of `alpha` where the active sum reaches `k`
fn interpolate(alpha0: f64, alpha1: f64, sum0: f64, sum1: f64, k: f64) -> f64 {
    if (sum1 - sum0).abs() <= f64::EPSILON {
        return alpha0;
    }
    alpha0 + (k - sum0) / (sum1 - sum0) * (alpha1 - alpha0)
}

impl ProximityOperator for KSupportNorm {
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64> {
        let shift = 2.0 * self.lambda * extra_factor;
        if shift == 0.0 {
            return data.to_vec();
        }

        let abs: Vec<f64> = data.iter().map(|c| c.norm()).collect();
        if abs.iter().all(|&a| a == 0.0) {
            return vec![Complex64::new(0.0, 0.0); data.len()];
        }

        let theta = match self.find_alpha(&abs, extra_factor) {
            Some(alpha) => Self::theta(&abs, alpha, shift),
            None => {
                tracing::warn!(k = self.k, "k-support search did not bracket k, using ridge shrinkage");
                vec![1.0; data.len()]
            }
        };

        data.iter()
            .zip(theta.iter())
            .map(|(&x, &t)| x * (t / (t + shift)))
            .collect()
    }

    fn cost(&self, data: &[Complex64]) -> f64 {
        let abs: Vec<f64> = data.iter().map(|c| c.norm()).collect();
        self.lambda * self.squared_norm(&abs)
    }
}
