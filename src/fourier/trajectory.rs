//! Sampling trajectory helpers
//!
//! Non-cartesian trajectories are row-major `(n_samples, n_dims)` arrays of
//! normalized frequencies in `[-0.5, 0.5)`. Cartesian masks are stored in
//! unshifted FFT order, so the frequency `k` along an axis of length `n`
//! lands on index `round(k * n) mod n`.

use crate::error::{ReconError, Result};
use crate::fft::{fftfreq, idx3d};

/// Axis lengths that carry frequency information: `[nx, ny]` for a 2D image
/// (`nz == 1`), `[nx, ny, nz]` otherwise.
pub fn grid_dims(shape: (usize, usize, usize)) -> Vec<usize> {
    let (nx, ny, nz) = shape;
    if nz == 1 {
        vec![nx, ny]
    } else {
        vec![nx, ny, nz]
    }
}

/// Check a coordinate array against the image dimensionality and the
/// normalized domain. Returns the number of samples.
pub fn validate_locations(locations: &[f64], shape: (usize, usize, usize)) -> Result<usize> {
    let n_dims = grid_dims(shape).len();
    if locations.len() % n_dims != 0 {
        return Err(ReconError::InvalidTrajectory(format!(
            "{} values cannot be split into {}-D coordinates",
            locations.len(),
            n_dims
        )));
    }
    if let Some(bad) = locations.iter().find(|&&k| !(-0.5..0.5).contains(&k)) {
        return Err(ReconError::InvalidTrajectory(format!(
            "coordinate {} outside [-0.5, 0.5)",
            bad
        )));
    }
    Ok(locations.len() / n_dims)
}

/// Rasterize normalized sample locations onto a binary mask
pub fn convert_locations_to_mask(locations: &[f64], shape: (usize, usize, usize)) -> Result<Vec<u8>> {
    let n_samples = validate_locations(locations, shape)?;
    let dims = grid_dims(shape);
    let n_dims = dims.len();
    let (nx, ny, nz) = shape;

    let mut mask = vec![0u8; nx * ny * nz];
    for m in 0..n_samples {
        let mut index = [0usize; 3];
        for d in 0..n_dims {
            let n = dims[d] as i64;
            let k = locations[m * n_dims + d];
            index[d] = ((k * n as f64).round() as i64).rem_euclid(n) as usize;
        }
        mask[idx3d(index[0], index[1], index[2], nx, ny)] = 1;
    }
    Ok(mask)
}

/// Normalized frequency of every sampled point of a binary mask
pub fn convert_mask_to_locations(mask: &[u8], shape: (usize, usize, usize)) -> Vec<f64> {
    let (nx, ny, nz) = shape;
    let dims = grid_dims(shape);
    let freqs: Vec<Vec<f64>> = dims.iter().map(|&n| fftfreq(n, 1.0)).collect();

    let mut locations = Vec::new();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if mask[idx3d(i, j, k, nx, ny)] == 0 {
                    continue;
                }
                let index = [i, j, k];
                for d in 0..dims.len() {
                    locations.push(freqs[d][index[d]]);
                }
            }
        }
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_locations_roundtrip() {
        let shape = (8, 6, 1);
        let mask: Vec<u8> = (0..48).map(|i| ((i * 7) % 3 == 0) as u8).collect();

        let locations = convert_mask_to_locations(&mask, shape);
        assert_eq!(locations.len(), 2 * mask.iter().filter(|&&m| m != 0).count());

        let back = convert_locations_to_mask(&locations, shape).unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_rejects_out_of_domain() {
        let err = convert_locations_to_mask(&[0.1, 0.5], (4, 4, 1)).unwrap_err();
        assert!(matches!(err, ReconError::InvalidTrajectory(_)));
    }

    #[test]
    fn test_rejects_wrong_dimensionality() {
        let err = validate_locations(&[0.1, 0.2, 0.3], (4, 4, 1)).unwrap_err();
        assert!(matches!(err, ReconError::InvalidTrajectory(_)));
    }
}
