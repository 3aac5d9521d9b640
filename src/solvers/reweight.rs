//! Weight re-estimation for iteratively reweighted L1
//!
//! - `Primal`: Candes-Wakin-Boyd update `w <- w / (1 + |W x| / (thr * w0))`.
//! - `Dual`: one noise level per band, estimated with the median absolute
//!   deviation of the dual variable, `w_band = thr * sigma`.
//! - `Manual`: fixed weights `mu`, no reweighting.

use num_complex::Complex64;
use std::str::FromStr;

use crate::error::{ReconError, Result};

/// How the noise level behind the regularization weights is estimated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdEstMethod {
    Primal,
    Dual,
    Manual,
}

impl FromStr for StdEstMethod {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primal" => Ok(StdEstMethod::Primal),
            "dual" => Ok(StdEstMethod::Dual),
            "manual" => Ok(StdEstMethod::Manual),
            other => Err(ReconError::UnknownMode {
                operator: "noise estimation",
                value: other.to_string(),
            }),
        }
    }
}

/// Candes-Wakin-Boyd reweighting
#[derive(Clone, Debug)]
pub struct CwbReweight {
    original: Vec<f64>,
    weights: Vec<f64>,
    thresh_factor: f64,
}

impl CwbReweight {
    pub fn new(weights: Vec<f64>, thresh_factor: f64) -> Self {
        Self { original: weights.clone(), weights, thresh_factor }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Update the weights from the current coefficients `W x`
    pub fn reweight(&mut self, coeffs: &[Complex64]) {
        for ((w, &w0), c) in self.weights.iter_mut().zip(self.original.iter()).zip(coeffs.iter()) {
            let denom = self.thresh_factor * w0;
            if denom > 0.0 {
                *w /= 1.0 + c.norm() / denom;
            }
        }
    }
}

/// Robust noise standard deviation: `median(|x|) / 0.6745`
pub fn sigma_mad(data: &[Complex64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut mags: Vec<f64> = data.iter().map(|c| c.norm()).collect();
    mags.sort_by(|a, b| a.total_cmp(b));
    let mid = mags.len() / 2;
    let median = if mags.len() % 2 == 0 {
        (mags[mid - 1] + mags[mid]) / 2.0
    } else {
        mags[mid]
    };
    median / 0.6745
}

/// Per-coefficient weights `thr * sigma_band`, one noise level per band
///
/// `coeffs` is a channel-major stack of coefficient vectors laid out by
/// `band_sizes`; every channel shares the band's noise estimate.
pub fn band_weights(coeffs: &[Complex64], band_sizes: &[usize], thresh_factor: f64) -> Vec<f64> {
    let n: usize = band_sizes.iter().sum();
    if n == 0 {
        return Vec::new();
    }
    let n_channels = coeffs.len() / n;
    let mut weights = vec![0.0; coeffs.len()];

    let mut offset = 0;
    for &size in band_sizes {
        let band: Vec<Complex64> = (0..n_channels)
            .flat_map(|c| coeffs[c * n + offset..c * n + offset + size].iter().copied())
            .collect();
        let w = thresh_factor * sigma_mad(&band);
        for c in 0..n_channels {
            weights[c * n + offset..c * n + offset + size].fill(w);
        }
        offset += size;
    }
    weights
}
