//! Power method
//!
//! Estimates the largest eigenvalue of a Hermitian positive semi-definite
//! operator `A^H A`, given as a closure. Used for the Lipschitz constant of
//! the data-fidelity gradient and for the norm of the sparsifying transform.

use num_complex::Complex64;

/// Power iteration on `op`
///
/// # Arguments
/// * `op` - Closure computing `A^H A v`
/// * `n` - Length of the vectors `op` acts on
/// * `max_iter` - Maximum iterations
/// * `tol` - Relative change of the estimate at which to stop
///
/// # Returns
/// Estimate of the spectral radius of `op`
pub fn power_method<F>(op: F, n: usize, max_iter: usize, tol: f64) -> f64
where
    F: Fn(&[Complex64]) -> Vec<Complex64>,
{
    if n == 0 {
        return 0.0;
    }

    // Deterministic start vector with no special structure
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
    };
    let mut x: Vec<Complex64> = (0..n).map(|_| Complex64::new(next(), next())).collect();
    normalize(&mut x);

    let mut estimate = 0.0;
    for iter in 0..max_iter {
        let mut x_new = op(&x);
        let norm = normalize(&mut x_new);
        if norm == 0.0 {
            return 0.0;
        }

        let converged = (norm - estimate).abs() <= tol * norm;
        estimate = norm;
        x = x_new;

        if converged {
            tracing::trace!(iter, estimate, "power method converged");
            break;
        }
    }
    estimate
}

/// Scale `x` to unit norm, returning the previous norm
fn normalize(x: &mut [Complex64]) -> f64 {
    let norm = x.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        for c in x.iter_mut() {
            *c /= norm;
        }
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let rho = power_method(|v| v.to_vec(), 16, 50, 1e-10);
        assert!((rho - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal() {
        let diag = [1.0, 4.0, 2.5, 0.5];
        let rho = power_method(
            |v| v.iter().zip(diag.iter()).map(|(&x, &d)| x * d).collect(),
            4, 500, 1e-12,
        );
        assert!((rho - 4.0).abs() < 1e-6, "Expected 4, got {}", rho);
    }

    #[test]
    fn test_zero_operator() {
        let rho = power_method(|v| vec![Complex64::new(0.0, 0.0); v.len()], 8, 10, 1e-6);
        assert_eq!(rho, 0.0);
    }
}
