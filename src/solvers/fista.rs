//! FISTA: Fast Iterative Shrinkage-Thresholding Algorithm
//!
//! Beck & Teboulle (2009). Each iteration takes a gradient step of size
//! `1 / L` from the extrapolated point `z`, applies the proximity operator,
//! and extrapolates with the momentum sequence
//! `t_{k+1} = (1 + sqrt(1 + 4 t_k^2)) / 2`.
//!
//! Reconstruction here is in synthesis form: the variable is the coefficient
//! vector of a sparsifying transform and the image is recovered with its
//! adjoint.

use num_complex::Complex64;

use super::{relative_change, SolverResult, Status};
use crate::error::{ReconError, Result};
use crate::gradient::GradientOperator;
use crate::linear::LinearOperator;
use crate::proximity::{ProximityOperator, SparseThreshold, Weights};

/// FISTA parameters
#[derive(Clone, Debug)]
pub struct FistaParams {
    /// Regularization strength of the L1 threshold
    pub mu: f64,
    /// Initial value of the momentum sequence (>= 1)
    pub lambda_init: f64,
    /// Iteration budget
    pub max_nb_of_iter: usize,
    /// Stop when the relative change of the iterate falls below this
    pub atol: f64,
    /// Record the cost at every iteration
    pub get_cost: bool,
}

impl Default for FistaParams {
    fn default() -> Self {
        Self {
            mu: 1e-6,
            lambda_init: 1.0,
            max_nb_of_iter: 300,
            atol: 1e-4,
            get_cost: false,
        }
    }
}

/// Generic FISTA on any gradient/proximity pair
///
/// # Arguments
/// * `grad` - Data-fidelity gradient
/// * `prox` - Proximity operator of the regularizer
/// * `x0` - Starting point
/// * `params` - Iteration budget, tolerance and cost recording
/// * `progress` - Called with (iteration, max_iterations) after every iteration
pub fn fista<G, P, F>(
    grad: &G,
    prox: &P,
    x0: Vec<Complex64>,
    params: &FistaParams,
    mut progress: F,
) -> SolverResult
where
    G: GradientOperator + ?Sized,
    P: ProximityOperator + ?Sized,
    F: FnMut(usize, usize),
{
    let step = grad.inv_spec_rad();
    let max_iter = params.max_nb_of_iter;

    tracing::info!(step, max_iter, atol = params.atol, "starting FISTA");

    let mut x = x0.clone();
    let mut z = x0;
    let mut t = params.lambda_init.max(1.0);
    let mut cost = Vec::new();
    let mut status = Status::Exhausted;
    let mut iterations = 0;

    for iter in 0..max_iter {
        let g = grad.get_grad(&z);
        let y: Vec<Complex64> = z.iter().zip(g.iter()).map(|(zi, gi)| zi - gi * step).collect();
        let x_new = prox.op(&y, step);

        let t_new = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
        let lambda = 1.0 + (t - 1.0) / t_new;
        z = x
            .iter()
            .zip(x_new.iter())
            .map(|(xo, xn)| xo + (xn - xo) * lambda)
            .collect();

        let change = relative_change(&x_new, &x);
        x = x_new;
        t = t_new;
        iterations = iter + 1;

        if params.get_cost {
            let c = grad.cost(&x) + prox.cost(&x);
            tracing::debug!(iter, cost = c, change, "FISTA iteration");
            cost.push(c);
        } else {
            tracing::debug!(iter, change, "FISTA iteration");
        }

        progress(iterations, max_iter);

        if change < params.atol {
            status = Status::Converged;
            break;
        }
    }

    tracing::info!(iterations, ?status, "FISTA finished");

    SolverResult { x_final: x, transform: None, cost, status, iterations }
}

/// Sparse reconstruction with FISTA and an L1 threshold of strength `mu`
///
/// `grad` must be a synthesis gradient over the coefficients of `linear`.
/// Returns the image stack and the final coefficients.
pub fn sparse_rec_fista(
    grad: &dyn GradientOperator,
    linear: &dyn LinearOperator,
    params: &FistaParams,
) -> Result<SolverResult> {
    sparse_rec_fista_with_progress(grad, linear, params, |_, _| {})
}

/// Sparse FISTA reconstruction with progress callback
pub fn sparse_rec_fista_with_progress<F>(
    grad: &dyn GradientOperator,
    linear: &dyn LinearOperator,
    params: &FistaParams,
    progress: F,
) -> Result<SolverResult>
where
    F: FnMut(usize, usize),
{
    let expected = grad.n_channels() * linear.n_coeffs();
    if grad.variable_len() != expected {
        return Err(ReconError::DimensionMismatch { expected, got: grad.variable_len() });
    }
    let prox = SparseThreshold::new(Weights::scalar(params.mu)?)?;

    let alpha0 = grad.initial_point();
    let mut result = fista(grad, &prox, alpha0, params, progress);

    let alpha = std::mem::take(&mut result.x_final);
    result.x_final = linear.adj_op_channels(&alpha);
    result.transform = Some(alpha);
    Ok(result)
}
