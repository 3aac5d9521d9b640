//! Condat-Vu primal-dual splitting
//!
//! Solves `min_x f(x) + g(x) + h(W x)` with `f` the data fidelity, `g` a
//! simple primal constraint (identity or positivity) and `h` the sparsity
//! penalty on the transform coefficients. One iteration:
//!
//! ```text
//! x_prox = prox_g(x - tau * (grad f(x) + W^H y), tau)
//! y_tmp  = y + sigma * W (2 x_prox - x)
//! y_prox = y_tmp - sigma * prox_h(y_tmp / sigma, 1 / sigma)
//! (x, y) <- rho * (x_prox, y_prox) + (1 - rho) * (x, y)
//! ```
//!
//! Convergence requires `1 / tau - sigma * ||W||^2 >= L / 2`.
//!
//! Reference:
//! Condat L. A primal-dual splitting method for convex optimization
//! involving Lipschitzian, proximable and linear composite terms.
//! J Optim Theory Appl. 2013;158(2):460-79.

use num_complex::Complex64;

use super::reweight::{band_weights, sigma_mad, CwbReweight, StdEstMethod};
use super::{relative_change, SolverResult, Status};
use crate::error::{ReconError, Result};
use crate::gradient::GradientOperator;
use crate::linear::LinearOperator;
use crate::proximity::{IdentityProx, Positivity, ProximityOperator, SparseThreshold, Weights};

/// Condat-Vu parameters
#[derive(Clone, Debug)]
pub struct CondatVuParams {
    /// Regularization strength when weights are not estimated
    pub mu: f64,
    /// Primal step; derived from `sigma` and the operator norms if `None`
    pub tau: Option<f64>,
    /// Dual step; 0.5 if `None`
    pub sigma: Option<f64>,
    /// Relaxation between the previous and new iterates (0, 2)
    pub relaxation_factor: f64,
    /// Reweighting rounds after the first solve
    pub nb_of_reweights: usize,
    /// Iteration budget per round
    pub max_nb_of_iter: usize,
    /// Project the image onto non-negative reals
    pub add_positivity: bool,
    /// Stop a round when the relative change of the image falls below this
    pub atol: f64,
    pub std_est_method: StdEstMethod,
    /// Known noise level; estimated when `None`
    pub std_est: Option<f64>,
    /// Threshold factor applied to the noise level
    pub std_thr: f64,
    pub get_cost: bool,
}

impl Default for CondatVuParams {
    fn default() -> Self {
        Self {
            mu: 1e-6,
            tau: None,
            sigma: None,
            relaxation_factor: 0.5,
            nb_of_reweights: 1,
            max_nb_of_iter: 150,
            add_positivity: false,
            atol: 1e-4,
            std_est_method: StdEstMethod::Manual,
            std_est: None,
            std_thr: 2.0,
            get_cost: false,
        }
    }
}

/// Primal/dual step sizes for the given Lipschitz constant and `||W||`
pub fn condat_vu_steps(lipschitz: f64, op_norm: f64, tau: Option<f64>, sigma: Option<f64>) -> (f64, f64) {
    let sigma = sigma.unwrap_or(0.5);
    let w2 = op_norm * op_norm;
    let tau = tau.unwrap_or(1.0 / (lipschitz / 2.0 + sigma * w2 + 1e-8));

    if 1.0 / tau - sigma * w2 < lipschitz / 2.0 {
        tracing::warn!(tau, sigma, lipschitz, "Condat-Vu step sizes violate the convergence condition");
    }
    (tau, sigma)
}

/// Primal image stack and dual coefficient stack
#[derive(Clone, Debug)]
struct PrimalDual {
    x: Vec<Complex64>,
    y: Vec<Complex64>,
}

struct Round {
    cost: Vec<f64>,
    status: Status,
    iterations: usize,
}

#[allow(clippy::too_many_arguments)]
fn iterate<G, P, D, F>(
    grad: &G,
    prox: &P,
    prox_dual: &D,
    linear: &dyn LinearOperator,
    state: &mut PrimalDual,
    (tau, sigma): (f64, f64),
    params: &CondatVuParams,
    mut progress: F,
) -> Round
where
    G: GradientOperator + ?Sized,
    P: ProximityOperator + ?Sized,
    D: ProximityOperator + ?Sized,
    F: FnMut(usize),
{
    let rho = params.relaxation_factor;
    let mut cost = Vec::new();
    let mut status = Status::Exhausted;
    let mut iterations = 0;

    for iter in 0..params.max_nb_of_iter {
        let g = grad.get_grad(&state.x);
        let wty = linear.adj_op_channels(&state.y);
        let step: Vec<Complex64> = state
            .x
            .iter()
            .zip(g.iter().zip(wty.iter()))
            .map(|(x, (g, w))| x - (g + w) * tau)
            .collect();
        let x_prox = prox.op(&step, tau);

        let x_bar: Vec<Complex64> = x_prox
            .iter()
            .zip(state.x.iter())
            .map(|(p, x)| p * 2.0 - x)
            .collect();
        let y_tmp: Vec<Complex64> = state
            .y
            .iter()
            .zip(linear.op_channels(&x_bar))
            .map(|(y, w)| y + w * sigma)
            .collect();
        let scaled: Vec<Complex64> = y_tmp.iter().map(|v| v / sigma).collect();
        let y_prox: Vec<Complex64> = y_tmp
            .iter()
            .zip(prox_dual.op(&scaled, 1.0 / sigma))
            .map(|(v, p)| v - p * sigma)
            .collect();

        let x_new: Vec<Complex64> = x_prox
            .iter()
            .zip(state.x.iter())
            .map(|(p, x)| p * rho + x * (1.0 - rho))
            .collect();
        for (y, p) in state.y.iter_mut().zip(y_prox.iter()) {
            *y = p * rho + *y * (1.0 - rho);
        }

        let change = relative_change(&x_new, &state.x);
        state.x = x_new;
        iterations = iter + 1;

        if params.get_cost {
            let c = grad.cost(&state.x)
                + prox.cost(&state.x)
                + prox_dual.cost(&linear.op_channels(&state.x));
            tracing::debug!(iter, cost = c, change, "Condat-Vu iteration");
            cost.push(c);
        } else {
            tracing::debug!(iter, change, "Condat-Vu iteration");
        }

        progress(iterations);

        if change < params.atol {
            status = Status::Converged;
            break;
        }
    }

    Round { cost, status, iterations }
}

/// Generic Condat-Vu on any gradient and primal/dual proximity pair
///
/// # Arguments
/// * `grad` - Data-fidelity gradient in image space
/// * `prox` - Primal proximity operator (e.g. `Positivity`)
/// * `prox_dual` - Proximity operator of the penalty on `W x`
/// * `linear` - Sparsifying transform `W`
/// * `x0`, `y0` - Starting primal image stack and dual coefficient stack
/// * `params` - Step sizes, relaxation, budget and tolerance
/// * `progress` - Called with (iteration, max_iterations)
///
/// # Returns
/// The final image and `W x` as `transform`
#[allow(clippy::too_many_arguments)]
pub fn condat_vu<G, P, D, F>(
    grad: &G,
    prox: &P,
    prox_dual: &D,
    linear: &dyn LinearOperator,
    x0: Vec<Complex64>,
    y0: Vec<Complex64>,
    params: &CondatVuParams,
    mut progress: F,
) -> SolverResult
where
    G: GradientOperator + ?Sized,
    P: ProximityOperator + ?Sized,
    D: ProximityOperator + ?Sized,
    F: FnMut(usize, usize),
{
    let steps = condat_vu_steps(grad.spec_rad(), linear.l2norm(), params.tau, params.sigma);
    tracing::info!(tau = steps.0, sigma = steps.1, "starting Condat-Vu");

    let max_iter = params.max_nb_of_iter;
    let mut state = PrimalDual { x: x0, y: y0 };
    let round = iterate(grad, prox, prox_dual, linear, &mut state, steps, params, |i| progress(i, max_iter));

    tracing::info!(iterations = round.iterations, status = ?round.status, "Condat-Vu finished");

    SolverResult {
        transform: Some(linear.op_channels(&state.x)),
        x_final: state.x,
        cost: round.cost,
        status: round.status,
        iterations: round.iterations,
    }
}

/// Sparse reconstruction with Condat-Vu and a reweighted L1 penalty
///
/// `grad` must be an analysis gradient (image-space variable). The solve
/// starts from zero, then runs `nb_of_reweights` more rounds from the
/// current state with re-estimated weights (`Primal` or `Dual`).
///
/// Initial weights: `mu` for `Manual`, otherwise `std_thr * std_est`. When
/// `std_est` is `None`, `Primal` estimates it with `sigma_mad` of `M^H y`
/// and `Dual` starts from zero.
pub fn sparse_rec_condatvu(
    grad: &dyn GradientOperator,
    linear: &dyn LinearOperator,
    params: &CondatVuParams,
) -> Result<SolverResult> {
    sparse_rec_condatvu_with_progress(grad, linear, params, |_, _| {})
}

/// Condat-Vu reconstruction with progress callback
///
/// Progress counts iterations over all rounds.
pub fn sparse_rec_condatvu_with_progress<F>(
    grad: &dyn GradientOperator,
    linear: &dyn LinearOperator,
    params: &CondatVuParams,
    mut progress: F,
) -> Result<SolverResult>
where
    F: FnMut(usize, usize),
{
    let n_channels = grad.n_channels();
    let expected = n_channels * linear.image_len();
    if grad.variable_len() != expected {
        return Err(ReconError::DimensionMismatch { expected, got: grad.variable_len() });
    }
    if !(params.relaxation_factor > 0.0 && params.relaxation_factor < 2.0) {
        return Err(ReconError::InvalidParameter(format!(
            "relaxation factor {} must be in (0, 2)",
            params.relaxation_factor
        )));
    }
    for (name, step) in [("tau", params.tau), ("sigma", params.sigma)] {
        if let Some(step) = step.filter(|s| !(*s > 0.0 && s.is_finite())) {
            return Err(ReconError::InvalidParameter(format!("{} must be positive, got {}", name, step)));
        }
    }

    let n_coeffs = n_channels * linear.n_coeffs();
    let mut state = PrimalDual {
        x: vec![Complex64::new(0.0, 0.0); expected],
        y: vec![Complex64::new(0.0, 0.0); n_coeffs],
    };

    let band_sizes = linear.band_sizes();
    let initial = match (params.std_est_method, params.std_est) {
        (StdEstMethod::Manual, _) => Weights::scalar(params.mu)?,
        (_, Some(std_est)) => Weights::scalar(params.std_thr * std_est)?,
        (StdEstMethod::Primal, None) => {
            let std_est = sigma_mad(&grad.initial_point());
            tracing::debug!(std_est, "noise level estimated from the adjoint reconstruction");
            Weights::scalar(params.std_thr * std_est)?
        }
        // Unregularized first round; later rounds estimate from the dual variable
        (StdEstMethod::Dual, None) => Weights::scalar(0.0)?,
    };
    let mut cwb = CwbReweight::new(initial.to_vec(n_coeffs), 1.0);
    let mut prox_dual = SparseThreshold::new(initial)?;

    let prox: Box<dyn ProximityOperator> = if params.add_positivity {
        Box::new(Positivity)
    } else {
        Box::new(IdentityProx)
    };

    let rounds = match params.std_est_method {
        StdEstMethod::Manual => 0,
        _ => params.nb_of_reweights,
    };
    if params.std_est_method == StdEstMethod::Manual && params.nb_of_reweights > 0 {
        tracing::debug!("manual weights: reweighting disabled");
    }

    let steps = condat_vu_steps(grad.spec_rad(), linear.l2norm(), params.tau, params.sigma);
    let total = params.max_nb_of_iter * (rounds + 1);
    tracing::info!(tau = steps.0, sigma = steps.1, rounds, "starting Condat-Vu reconstruction");

    let mut cost = Vec::new();
    let mut iterations = 0;
    let mut status = Status::Exhausted;

    for round in 0..=rounds {
        if round > 0 {
            let weights = match params.std_est_method {
                StdEstMethod::Primal => {
                    cwb.reweight(&linear.op_channels(&state.x));
                    cwb.weights().to_vec()
                }
                _ => band_weights(&state.y, &band_sizes, params.std_thr),
            };
            prox_dual.set_weights(Weights::per_coefficient(weights)?)?;
            tracing::info!(round, "reweighting");
        }

        let done = iterations;
        let result = iterate(
            grad, prox.as_ref(), &prox_dual, linear, &mut state, steps, params,
            |i| progress(done + i, total),
        );
        cost.extend(result.cost);
        iterations += result.iterations;
        status = result.status;
    }

    tracing::info!(iterations, ?status, "Condat-Vu reconstruction finished");

    Ok(SolverResult {
        transform: Some(linear.op_channels(&state.x)),
        x_final: state.x,
        cost,
        status,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::test_utils::random_complex;
    use crate::fourier::{CartesianFft, FourierOperator};
    use crate::gradient::GradAnalysis;
    use crate::linear::HaarWavelet;

    #[test]
    fn test_default_steps_satisfy_condition() {
        let (tau, sigma) = condat_vu_steps(1.0, 1.0, None, None);
        assert_eq!(sigma, 0.5);
        assert!(1.0 / tau - sigma >= 0.5);
    }

    #[test]
    fn test_matches_wavelet_soft_threshold() {
        // Fully sampled with an orthonormal transform, the minimizer is
        // W^H soft(W I, mu)
        let fourier = CartesianFft::full(8, 8, 1);
        let haar = HaarWavelet::new(8, 8, 1, 2).unwrap();
        let img = random_complex(64, 1);
        let data = fourier.op(&img);
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

        let params = CondatVuParams {
            mu: 0.1,
            max_nb_of_iter: 2000,
            atol: 1e-12,
            nb_of_reweights: 0,
            ..Default::default()
        };
        let result = sparse_rec_condatvu(&grad, &haar, &params).unwrap();

        let lasso = SparseThreshold::new(Weights::Scalar(0.1)).unwrap();
        let expected = haar.adj_op(&lasso.op(&haar.op(&img), 1.0));
        for (a, b) in result.x_final.iter().zip(expected.iter()) {
            assert!((a - b).norm() < 1e-5, "Expected {}, got {}", b, a);
        }
    }

    #[test]
    fn test_positivity() {
        let fourier = CartesianFft::full(4, 4, 1);
        let haar = HaarWavelet::new(4, 4, 1, 1).unwrap();
        let data = fourier.op(&random_complex(16, 2));
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

        let params = CondatVuParams { add_positivity: true, max_nb_of_iter: 50, ..Default::default() };
        let result = sparse_rec_condatvu(&grad, &haar, &params).unwrap();
        assert!(result.x_final.iter().all(|c| c.re >= 0.0 && c.im == 0.0));
    }

    #[test]
    fn test_progress_spans_all_rounds() {
        let fourier = CartesianFft::full(4, 4, 1);
        let haar = HaarWavelet::new(4, 4, 1, 1).unwrap();
        let data = fourier.op(&random_complex(16, 3));
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

        let params = CondatVuParams {
            mu: 0.01,
            max_nb_of_iter: 10,
            atol: 0.0,
            nb_of_reweights: 2,
            std_est_method: StdEstMethod::Primal,
            get_cost: true,
            ..Default::default()
        };
        let mut last = (0, 0);
        let result = sparse_rec_condatvu_with_progress(&grad, &haar, &params, |i, n| last = (i, n)).unwrap();

        assert_eq!(result.iterations, 30);
        assert_eq!(last, (30, 30));
        assert_eq!(result.cost.len(), 30);
    }

    #[test]
    fn test_invalid_relaxation() {
        let fourier = CartesianFft::full(4, 4, 1);
        let haar = HaarWavelet::new(4, 4, 1, 1).unwrap();
        let data = random_complex(16, 4);
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();
        let params = CondatVuParams { relaxation_factor: 2.5, ..Default::default() };
        assert!(matches!(
            sparse_rec_condatvu(&grad, &haar, &params),
            Err(ReconError::InvalidParameter(_))
        ));
    }

    fn undersampled_problem(seed: u64) -> (CartesianFft, HaarWavelet, Vec<Complex64>) {
        let mask: Vec<u8> = (0..64).map(|i| (i % 3 != 1) as u8).collect();
        let fourier = CartesianFft::from_mask(&mask, 8, 8, 1).unwrap();
        let haar = HaarWavelet::new(8, 8, 1, 2).unwrap();
        let data = fourier.op(&random_complex(64, seed));
        (fourier, haar, data)
    }

    #[test]
    fn test_dual_reweighting_updates_given_noise_level() {
        let (fourier, haar, data) = undersampled_problem(5);
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

        let base = CondatVuParams {
            atol: 0.0,
            std_est_method: StdEstMethod::Dual,
            std_est: Some(0.05),
            ..Default::default()
        };
        let reweighted = CondatVuParams { nb_of_reweights: 2, max_nb_of_iter: 20, ..base.clone() };
        let continued = CondatVuParams { nb_of_reweights: 0, max_nb_of_iter: 60, ..base };

        let a = sparse_rec_condatvu(&grad, &haar, &reweighted).unwrap();
        let b = sparse_rec_condatvu(&grad, &haar, &continued).unwrap();
        assert_eq!(a.iterations, b.iterations);

        let max_diff = a
            .x_final
            .iter()
            .zip(b.x_final.iter())
            .map(|(p, q)| (p - q).norm())
            .fold(0.0, f64::max);
        assert!(max_diff > 1e-6, "reweighting rounds left the solve unchanged: {}", max_diff);
    }

    #[test]
    fn test_dual_without_noise_level_is_unbiased() {
        // Noiseless, fully sampled: zero initial weights keep the dual
        // variable at zero, so every round recovers the image
        let fourier = CartesianFft::full(8, 8, 1);
        let haar = HaarWavelet::new(8, 8, 1, 2).unwrap();
        let img = random_complex(64, 6);
        let data = fourier.op(&img);
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

        let params = CondatVuParams {
            nb_of_reweights: 2,
            max_nb_of_iter: 100,
            atol: 0.0,
            std_est_method: StdEstMethod::Dual,
            ..Default::default()
        };
        let result = sparse_rec_condatvu(&grad, &haar, &params).unwrap();
        for (a, b) in result.x_final.iter().zip(img.iter()) {
            assert!((a - b).norm() < 1e-6, "Expected {}, got {}", b, a);
        }
    }

    #[test]
    fn test_primal_estimates_noise_from_adjoint() {
        let (fourier, haar, data) = undersampled_problem(7);
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

        // `mu` only applies to manual weights
        let estimated = CondatVuParams {
            mu: 1e6,
            nb_of_reweights: 0,
            max_nb_of_iter: 30,
            std_est_method: StdEstMethod::Primal,
            ..Default::default()
        };
        let given = CondatVuParams {
            std_est: Some(sigma_mad(&grad.initial_point())),
            ..estimated.clone()
        };

        let a = sparse_rec_condatvu(&grad, &haar, &estimated).unwrap();
        let b = sparse_rec_condatvu(&grad, &haar, &given).unwrap();
        assert_eq!(a.x_final, b.x_final);
    }

    #[test]
    fn test_invalid_steps() {
        let fourier = CartesianFft::full(4, 4, 1);
        let haar = HaarWavelet::new(4, 4, 1, 1).unwrap();
        let data = random_complex(16, 8);
        let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

        for params in [
            CondatVuParams { sigma: Some(0.0), ..Default::default() },
            CondatVuParams { tau: Some(-1.0), ..Default::default() },
            CondatVuParams { tau: Some(f64::NAN), ..Default::default() },
        ] {
            assert!(matches!(
                sparse_rec_condatvu(&grad, &haar, &params),
                Err(ReconError::InvalidParameter(_))
            ));
        }
    }
}
