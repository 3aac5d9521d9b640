//! Sparse-MRI: compressed-sensing MRI reconstruction
//!
//! Reconstructs images from undersampled k-space with sparsity-regularized
//! optimization, and exposes the reconstructions to WebAssembly.
//!
//! # Modules
//! - `fft`: 3D FFT plans using rustfft
//! - `fourier`: Cartesian FFT, direct NDFT and gridding NUFFT operators
//! - `linear`: Sparsifying transforms (identity, Haar wavelet)
//! - `gradient`: Data-fidelity gradients (analysis, synthesis)
//! - `proximity`: Regularizers (lasso, elastic-net, group-lasso, nuclear norm, OWL, k-support)
//! - `solvers`: FISTA, Condat-Vu, reweighting, power method
//! - `patches`, `parallel`: Patch layout and worker-pool helpers

// Core modules
pub mod error;
pub mod fft;
pub mod parallel;
pub mod patches;

// Operators
pub mod fourier;
pub mod gradient;
pub mod linear;
pub mod proximity;

// Optimization
pub mod solvers;

pub use error::{ReconError, Result};

use num_complex::Complex64;
use wasm_bindgen::prelude::*;

use fourier::{CartesianFft, FourierOperator, Nufft, Platform};
use gradient::{GradAnalysis, GradSynthesis};
use linear::HaarWavelet;
use solvers::{CondatVuParams, FistaParams, StdEstMethod};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

#[allow(unused_macros)]
macro_rules! console_log {
    ($($t:tt)*) => (log(&format_args!($($t)*).to_string()))
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(err: ReconError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Pair separate real/imaginary arrays into complex values
fn to_complex(re: &[f64], im: &[f64]) -> Result<Vec<Complex64>> {
    if re.len() != im.len() {
        return Err(ReconError::DimensionMismatch { expected: re.len(), got: im.len() });
    }
    Ok(re.iter().zip(im.iter()).map(|(&r, &i)| Complex64::new(r, i)).collect())
}

/// Flatten complex values as all real parts followed by all imaginary parts
fn split_complex(values: &[Complex64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(2 * values.len());
    out.extend(values.iter().map(|c| c.re));
    out.extend(values.iter().map(|c| c.im));
    out
}

// ============================================================================
// WASM Exports: Fourier operators
// ============================================================================

/// Zero-filled reconstruction of masked cartesian k-space
///
/// # Arguments
/// * `kspace_re`, `kspace_im` - K-space on the full grid (nx * ny * nz), unshifted
/// * `mask` - Sampling mask (nx * ny * nz), 1 = sampled
/// * `nx`, `ny`, `nz` - Image dimensions
///
/// # Returns
/// Real parts followed by imaginary parts of the image
#[wasm_bindgen]
pub fn zero_filled_wasm(
    kspace_re: &[f64],
    kspace_im: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
) -> std::result::Result<Vec<f64>, JsValue> {
    console_log!("WASM zero-filled: {}x{}x{}", nx, ny, nz);

    let kspace = to_complex(kspace_re, kspace_im).map_err(js_error)?;
    let fourier = CartesianFft::from_mask(mask, nx, ny, nz).map_err(js_error)?;
    if kspace.len() != fourier.n_samples() {
        return Err(js_error(ReconError::DimensionMismatch {
            expected: fourier.n_samples(),
            got: kspace.len(),
        }));
    }

    Ok(split_complex(&fourier.adj_op(&kspace)))
}

/// Adjoint NUFFT of non-cartesian samples
///
/// # Arguments
/// * `samples_re`, `samples_im` - K-space samples (n_samples)
/// * `locations` - Normalized coordinates (n_samples * n_dims) in [-0.5, 0.5)
/// * `nx`, `ny`, `nz` - Image dimensions
/// * `platform` - "cpu" or "mcpu" ("gpu" when built with the `gpu` feature)
/// * `oversampling` - Grid oversampling factor (>= 1)
/// * `jd` - Interpolation kernel width
#[wasm_bindgen]
pub fn nufft_adjoint_wasm(
    samples_re: &[f64],
    samples_im: &[f64],
    locations: &[f64],
    nx: usize, ny: usize, nz: usize,
    platform: &str,
    oversampling: f64,
    jd: usize,
) -> std::result::Result<Vec<f64>, JsValue> {
    console_log!("WASM NUFFT adjoint: {}x{}x{}, platform={}, jd={}", nx, ny, nz, platform, jd);

    let platform: Platform = platform.parse().map_err(js_error)?;
    let samples = to_complex(samples_re, samples_im).map_err(js_error)?;
    let kd: Vec<usize> = fourier::grid_dims((nx, ny, nz))
        .iter()
        .map(|&n| (n as f64 * oversampling.max(1.0)).ceil() as usize)
        .collect();

    let nufft = Nufft::new(locations, nx, ny, nz, platform, Some(kd.as_slice()), Some(jd)).map_err(js_error)?;
    if samples.len() != nufft.n_samples() {
        return Err(js_error(ReconError::DimensionMismatch {
            expected: nufft.n_samples(),
            got: samples.len(),
        }));
    }

    Ok(split_complex(&nufft.adj_op(&samples)))
}

// ============================================================================
// WASM Exports: Reconstruction
// ============================================================================

/// FISTA reconstruction of masked cartesian k-space with a Haar wavelet prior
///
/// # Arguments
/// * `kspace_re`, `kspace_im` - K-space on the full grid (nx * ny * nz), unshifted
/// * `mask` - Sampling mask (nx * ny * nz)
/// * `nx`, `ny`, `nz` - Image dimensions
/// * `nb_scale` - Wavelet decomposition levels
/// * `mu` - L1 regularization strength
/// * `max_iter` - Iteration budget
/// * `atol` - Relative change tolerance
///
/// # Returns
/// Real parts followed by imaginary parts of the image
#[wasm_bindgen]
pub fn fista_wasm(
    kspace_re: &[f64],
    kspace_im: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    nb_scale: usize,
    mu: f64,
    max_iter: usize,
    atol: f64,
) -> std::result::Result<Vec<f64>, JsValue> {
    console_log!("WASM FISTA: {}x{}x{}, mu={:.2e}, max_iter={}", nx, ny, nz, mu, max_iter);
    let result = run_fista(kspace_re, kspace_im, mask, (nx, ny, nz), nb_scale, mu, max_iter, atol, |_, _| {})
        .map_err(js_error)?;
    console_log!("WASM FISTA complete");
    Ok(result)
}

/// FISTA with progress callback
#[wasm_bindgen]
pub fn fista_wasm_with_progress(
    kspace_re: &[f64],
    kspace_im: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    nb_scale: usize,
    mu: f64,
    max_iter: usize,
    atol: f64,
    progress_callback: &js_sys::Function,
) -> std::result::Result<Vec<f64>, JsValue> {
    console_log!("WASM FISTA with progress: {}x{}x{}, mu={:.2e}, max_iter={}", nx, ny, nz, mu, max_iter);

    let callback = progress_callback.clone();
    let result = run_fista(
        kspace_re, kspace_im, mask, (nx, ny, nz), nb_scale, mu, max_iter, atol,
        |current, total| {
            let this = JsValue::null();
            let _ = callback.call2(&this,
                &JsValue::from(current as u32),
                &JsValue::from(total as u32));
        },
    )
    .map_err(js_error)?;

    console_log!("WASM FISTA complete");
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn run_fista<F: FnMut(usize, usize)>(
    kspace_re: &[f64],
    kspace_im: &[f64],
    mask: &[u8],
    (nx, ny, nz): (usize, usize, usize),
    nb_scale: usize,
    mu: f64,
    max_iter: usize,
    atol: f64,
    progress: F,
) -> Result<Vec<f64>> {
    let kspace = to_complex(kspace_re, kspace_im)?;
    let fourier = CartesianFft::from_mask(mask, nx, ny, nz)?;
    let haar = HaarWavelet::new(nx, ny, nz, nb_scale)?;
    let grad = GradSynthesis::new(&kspace, &fourier, &haar, 1)?;

    let params = FistaParams { mu, max_nb_of_iter: max_iter, atol, ..Default::default() };
    let result = solvers::sparse_rec_fista_with_progress(&grad, &haar, &params, progress)?;
    Ok(split_complex(&result.x_final))
}

/// Condat-Vu reconstruction of masked cartesian k-space with a Haar wavelet prior
///
/// # Arguments
/// * `kspace_re`, `kspace_im` - K-space on the full grid (nx * ny * nz), unshifted
/// * `mask` - Sampling mask (nx * ny * nz)
/// * `nx`, `ny`, `nz` - Image dimensions
/// * `nb_scale` - Wavelet decomposition levels
/// * `mu` - L1 regularization strength when `nb_of_reweights == 0`
/// * `nb_of_reweights` - Reweighting rounds; > 0 estimates the weights from the data
/// * `max_iter` - Iteration budget per round
/// * `add_positivity` - Constrain the image to non-negative reals
/// * `atol` - Relative change tolerance
#[wasm_bindgen]
pub fn condatvu_wasm(
    kspace_re: &[f64],
    kspace_im: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    nb_scale: usize,
    mu: f64,
    nb_of_reweights: usize,
    max_iter: usize,
    add_positivity: bool,
    atol: f64,
) -> std::result::Result<Vec<f64>, JsValue> {
    console_log!("WASM Condat-Vu: {}x{}x{}, mu={:.2e}, reweights={}, max_iter={}",
        nx, ny, nz, mu, nb_of_reweights, max_iter);
    let params = condatvu_params(mu, nb_of_reweights, max_iter, add_positivity, atol);
    let result = run_condatvu(kspace_re, kspace_im, mask, (nx, ny, nz), nb_scale, &params, |_, _| {})
        .map_err(js_error)?;
    console_log!("WASM Condat-Vu complete");
    Ok(result)
}

/// Condat-Vu with progress callback
#[wasm_bindgen]
pub fn condatvu_wasm_with_progress(
    kspace_re: &[f64],
    kspace_im: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    nb_scale: usize,
    mu: f64,
    nb_of_reweights: usize,
    max_iter: usize,
    add_positivity: bool,
    atol: f64,
    progress_callback: &js_sys::Function,
) -> std::result::Result<Vec<f64>, JsValue> {
    console_log!("WASM Condat-Vu with progress: {}x{}x{}, mu={:.2e}, reweights={}, max_iter={}",
        nx, ny, nz, mu, nb_of_reweights, max_iter);

    let params = condatvu_params(mu, nb_of_reweights, max_iter, add_positivity, atol);
    let callback = progress_callback.clone();
    let result = run_condatvu(
        kspace_re, kspace_im, mask, (nx, ny, nz), nb_scale, &params,
        |current, total| {
            let this = JsValue::null();
            let _ = callback.call2(&this,
                &JsValue::from(current as u32),
                &JsValue::from(total as u32));
        },
    )
    .map_err(js_error)?;

    console_log!("WASM Condat-Vu complete");
    Ok(result)
}

fn condatvu_params(
    mu: f64,
    nb_of_reweights: usize,
    max_iter: usize,
    add_positivity: bool,
    atol: f64,
) -> CondatVuParams {
    CondatVuParams {
        mu,
        nb_of_reweights,
        max_nb_of_iter: max_iter,
        add_positivity,
        atol,
        std_est_method: if nb_of_reweights > 0 { StdEstMethod::Primal } else { StdEstMethod::Manual },
        ..Default::default()
    }
}

fn run_condatvu<F: FnMut(usize, usize)>(
    kspace_re: &[f64],
    kspace_im: &[f64],
    mask: &[u8],
    (nx, ny, nz): (usize, usize, usize),
    nb_scale: usize,
    params: &CondatVuParams,
    progress: F,
) -> Result<Vec<f64>> {
    let kspace = to_complex(kspace_re, kspace_im)?;
    let fourier = CartesianFft::from_mask(mask, nx, ny, nz)?;
    let haar = HaarWavelet::new(nx, ny, nz, nb_scale)?;
    let grad = GradAnalysis::new(&kspace, &fourier, 1)?;

    let result = solvers::sparse_rec_condatvu_with_progress(&grad, &haar, params, progress)?;
    Ok(split_complex(&result.x_final))
}

// ============================================================================
// WASM Exports: Utilities
// ============================================================================

/// Get version string
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Whether a NUFFT platform ("cpu", "mcpu", "gpu") is available in this build
#[wasm_bindgen]
pub fn backend_available_wasm(platform: &str) -> bool {
    platform
        .parse::<Platform>()
        .map(fourier::backend_available)
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_complex_packing() {
        let values = to_complex(&[1.0, 2.0], &[-1.0, 0.5]).unwrap();
        assert_eq!(split_complex(&values), vec![1.0, 2.0, -1.0, 0.5]);
        assert!(to_complex(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_backend_query() {
        assert!(backend_available_wasm("cpu"));
        assert!(backend_available_wasm("mcpu"));
        assert!(!backend_available_wasm("tpu"));
    }

    #[test]
    fn test_run_fista_fully_sampled() {
        let (nx, ny) = (8, 8);
        let img: Vec<Complex64> = (0..64).map(|i| Complex64::new((i % 7) as f64, 0.0)).collect();
        let mut kspace = img.clone();
        fft::FftPlan3d::<f64>::new(nx, ny, 1).forward_ortho(&mut kspace);
        let re: Vec<f64> = kspace.iter().map(|c| c.re).collect();
        let im: Vec<f64> = kspace.iter().map(|c| c.im).collect();

        let out = run_fista(&re, &im, &[1u8; 64], (nx, ny, 1), 2, 0.0, 50, 1e-6, |_, _| {}).unwrap();
        for (i, c) in img.iter().enumerate() {
            assert!((out[i] - c.re).abs() < 1e-9);
            assert!(out[64 + i].abs() < 1e-9);
        }
    }
}
