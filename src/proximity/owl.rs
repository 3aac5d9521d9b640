//! Ordered weighted L1 (OWL) proximity operator, with OSCAR weights
//!
//! The prox sorts the magnitudes in decreasing order, subtracts the
//! (non-increasing) weights, projects onto the non-negative non-increasing
//! cone with the pool-adjacent-violators algorithm, undoes the sort and
//! restores the phase.

use num_complex::Complex64;
use std::str::FromStr;

use super::ProximityOperator;
use crate::error::{ReconError, Result};
use crate::linear::LinearOperator;

/// Grouping of the coefficients into independent OWL problems
#[derive(Clone, Debug, PartialEq)]
pub enum OwlMode {
    /// One problem over the whole stack
    All,
    /// One problem per band, across channels
    BandBased(Vec<usize>),
    /// One problem per coefficient index, across channels
    CoeffBased,
}

impl FromStr for OwlMode {
    type Err = ReconError;

    /// `"band_based"` parses without a layout; see `OwlMode::with_layout`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(OwlMode::All),
            "band_based" => Ok(OwlMode::BandBased(Vec::new())),
            "coeff_based" => Ok(OwlMode::CoeffBased),
            other => Err(ReconError::UnknownMode { operator: "OWL", value: other.to_string() }),
        }
    }
}

impl OwlMode {
    /// Fill in the band layout of `BandBased` from a linear operator
    pub fn with_layout(self, linear: Option<&dyn LinearOperator>) -> Result<Self> {
        match self {
            OwlMode::BandBased(bands) if bands.is_empty() => {
                let linear = linear.ok_or(ReconError::MissingLinearOperator("band-based OWL"))?;
                Ok(OwlMode::BandBased(linear.band_sizes()))
            }
            mode => Ok(mode),
        }
    }
}

/// OSCAR weights `alpha + beta * (n - 1 - i)`, non-increasing
pub fn oscar_weights(alpha: f64, beta: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| alpha + beta * (n - 1 - i) as f64).collect()
}

pub struct Owl {
    alpha: f64,
    beta: Option<f64>,
    mode: OwlMode,
    n_channels: usize,
}

impl Owl {
    /// # Arguments
    /// * `alpha` - Base weight
    /// * `beta` - OSCAR pairwise weight; `None` gives uniform weights `alpha`
    /// * `mode` - Problem grouping
    /// * `n_channels` - Channels in the coefficient stack
    pub fn new(alpha: f64, beta: Option<f64>, mode: OwlMode, n_channels: usize) -> Result<Self> {
        if alpha < 0.0 || beta.is_some_and(|b| b < 0.0) {
            return Err(ReconError::NegativeWeight);
        }
        if n_channels == 0 {
            return Err(ReconError::InvalidParameter("n_channels must be at least 1".into()));
        }
        if let OwlMode::BandBased(bands) = &mode {
            if bands.is_empty() {
                return Err(ReconError::MissingLinearOperator("band-based OWL"));
            }
        }
        if beta.is_some() {
            tracing::info!("OWL using OSCAR weights");
        }
        Ok(Self { alpha, beta, mode, n_channels })
    }

    fn weights(&self, n: usize) -> Vec<f64> {
        match self.beta {
            Some(beta) => oscar_weights(self.alpha, beta, n),
            None => vec![self.alpha; n],
        }
    }

    /// Index sets of the independent problems for data of length `len`
    fn groups(&self, len: usize) -> Vec<Vec<usize>> {
        let n = len / self.n_channels;
        match &self.mode {
            OwlMode::All => vec![(0..len).collect()],
            OwlMode::BandBased(bands) => {
                debug_assert_eq!(
                    bands.iter().sum::<usize>(),
                    n,
                    "band sizes must cover one channel of the coefficient stack"
                );
                let mut offset = 0;
                bands
                    .iter()
                    .map(|&size| {
                        let group: Vec<usize> = (0..self.n_channels)
                            .flat_map(|c| c * n + offset..c * n + offset + size)
                            .collect();
                        offset += size;
                        group
                    })
                    .collect()
            }
            OwlMode::CoeffBased => (0..n)
                .map(|i| (0..self.n_channels).map(|c| c * n + i).collect())
                .collect(),
        }
    }
}

/// Prox of the OWL norm on one group, with thresholds `w` (non-increasing)
fn prox_owl(values: &[Complex64], w: &[f64]) -> Vec<Complex64> {
    let mags: Vec<f64> = values.iter().map(|c| c.norm()).collect();
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| mags[b].total_cmp(&mags[a]));

    let shifted: Vec<f64> = order.iter().zip(w.iter()).map(|(&i, &t)| mags[i] - t).collect();
    let projected = isotonic_non_increasing(&shifted);

    let mut out = vec![Complex64::new(0.0, 0.0); values.len()];
    for (&i, &m) in order.iter().zip(projected.iter()) {
        let m = m.max(0.0);
        if mags[i] > 0.0 {
            out[i] = values[i] * (m / mags[i]);
        }
    }
    out
}

/// Least-squares fit of a non-increasing sequence (pool adjacent violators)
fn isotonic_non_increasing(y: &[f64]) -> Vec<f64> {
    // Blocks of (sum, count)
    let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(y.len());
    for &v in y {
        blocks.push((v, 1));
        while blocks.len() > 1 {
            let (s1, c1) = blocks[blocks.len() - 1];
            let (s0, c0) = blocks[blocks.len() - 2];
            if s0 / c0 as f64 >= s1 / c1 as f64 {
                break;
            }
            blocks.pop();
            let last = blocks.len() - 1;
            blocks[last] = (s0 + s1, c0 + c1);
        }
    }

    let mut out = Vec::with_capacity(y.len());
    for (s, c) in blocks {
        out.extend(std::iter::repeat(s / c as f64).take(c));
    }
    out
}

impl ProximityOperator for Owl {
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64> {
        let mut out = vec![Complex64::new(0.0, 0.0); data.len()];
        for group in self.groups(data.len()) {
            let values: Vec<Complex64> = group.iter().map(|&i| data[i]).collect();
            let w: Vec<f64> = self.weights(group.len()).iter().map(|t| t * extra_factor).collect();
            for (&i, v) in group.iter().zip(prox_owl(&values, &w)) {
                out[i] = v;
            }
        }
        out
    }

    /// Not available for OWL: reports 0
    fn cost(&self, _data: &[Complex64]) -> f64 {
        tracing::warn!("OWL cost is not implemented, reporting 0");
        0.0
    }
}
