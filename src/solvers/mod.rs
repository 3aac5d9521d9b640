//! Iterative reconstruction solvers
//!
//! - `fista`: accelerated proximal gradient
//! - `condat_vu`: primal-dual splitting with optional reweighting
//! - `power`: power method for Lipschitz constants and operator norms
//! - `reweight`: weight re-estimation between Condat-Vu rounds

pub mod condat_vu;
pub mod fista;
pub mod power;
pub mod reweight;

pub use condat_vu::*;
pub use fista::*;
pub use power::*;
pub use reweight::*;

use num_complex::Complex64;

/// How a solver run ended; both are normal termination
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Relative change of the iterate fell below `atol`
    Converged,
    /// Iteration budget used up
    Exhausted,
}

/// Output of a reconstruction
#[derive(Clone, Debug)]
pub struct SolverResult {
    /// Reconstructed image stack (channel-major)
    pub x_final: Vec<Complex64>,
    /// Final coefficients of the linear transform, when it is computed
    pub transform: Option<Vec<Complex64>>,
    /// Cost per iteration, empty unless requested
    pub cost: Vec<f64>,
    pub status: Status,
    pub iterations: usize,
}

pub(crate) fn norm(x: &[Complex64]) -> f64 {
    x.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt()
}

/// `||x_new - x_old|| / ||x_new||`
pub(crate) fn relative_change(x_new: &[Complex64], x_old: &[Complex64]) -> f64 {
    let diff = x_new
        .iter()
        .zip(x_old.iter())
        .map(|(a, b)| (a - b).norm_sqr())
        .sum::<f64>()
        .sqrt();
    diff / norm(x_new).max(f64::EPSILON)
}
