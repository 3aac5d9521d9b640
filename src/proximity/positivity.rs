//! Projection onto non-negative real images

use num_complex::Complex64;

use super::ProximityOperator;

#[derive(Clone, Copy, Debug, Default)]
pub struct Positivity;

impl ProximityOperator for Positivity {
    fn op(&self, data: &[Complex64], _extra_factor: f64) -> Vec<Complex64> {
        data.iter()
            .map(|c| Complex64::new(c.re.max(0.0), 0.0))
            .collect()
    }

    fn cost(&self, _data: &[Complex64]) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection() {
        let x = vec![Complex64::new(-1.0, 2.0), Complex64::new(0.5, -3.0)];
        let y = Positivity.op(&x, 1.0);
        assert_eq!(y, vec![Complex64::new(0.0, 0.0), Complex64::new(0.5, 0.0)]);
    }
}
