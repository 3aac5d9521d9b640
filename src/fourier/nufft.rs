//! Gridding non-uniform FFT
//!
//! The image is pre-scaled by the inverse kernel spectrum (deapodization),
//! placed on an oversampled grid `kd >= shape`, transformed with an FFT, and
//! interpolated at each trajectory point with a separable kernel of width
//! `jd`. The adjoint spreads samples with the same weights, applies the
//! inverse FFT, crops, and applies the same deapodization, so the pair is an
//! exact adjoint whatever the interpolation accuracy.
//!
//! - `jd == 1`: nearest-neighbour interpolation, no deapodization. With
//!   `kd == shape` and on-grid samples this is exactly the NDFT.
//! - `jd > 1`: Kaiser-Bessel kernel (Beatty et al. 2005 shape parameter).
//!
//! Interpolation weights are computed once at construction.

use num_complex::{Complex, Complex64};
use rustfft::num_traits::Zero;
use rustfft::FftNum;
use std::ops::Range;
use std::str::FromStr;

use super::trajectory::{grid_dims, validate_locations};
use super::FourierOperator;
use crate::error::{ReconError, Result};
use crate::fft::{idx3d, scalar, FftPlan3d};
use crate::parallel::{available_workers, WorkerPool};

/// Hardware platform executing the NUFFT
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Sequential double precision
    Cpu,
    /// Multi-threaded double precision
    MultiCpu,
    /// Single-precision offload path (requires the `gpu` feature)
    Gpu,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Cpu => "cpu",
            Platform::MultiCpu => "mcpu",
            Platform::Gpu => "gpu",
        }
    }
}

impl FromStr for Platform {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpu" => Ok(Platform::Cpu),
            "mcpu" => Ok(Platform::MultiCpu),
            "gpu" => Ok(Platform::Gpu),
            other => Err(ReconError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Whether the given platform can run in this build
pub fn backend_available(platform: Platform) -> bool {
    match platform {
        Platform::Cpu | Platform::MultiCpu => true,
        Platform::Gpu => cfg!(feature = "gpu"),
    }
}

/// Modified Bessel function of the first kind, order zero (power series)
fn bessel_i0(x: f64) -> f64 {
    let q = x * x / 4.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    while term > 1e-17 * sum {
        term *= q / (k * k);
        sum += term;
        k += 1.0;
    }
    sum
}

/// Separable Kaiser-Bessel interpolation kernel along one axis
#[derive(Clone, Copy, Debug)]
struct KaiserBessel {
    width: f64,
    beta: f64,
    norm: f64,
}

impl KaiserBessel {
    fn new(width: usize, oversampling: f64) -> Self {
        let j = width as f64;
        let a = oversampling;
        let arg = (j / a).powi(2) * (a - 0.5).powi(2) - 0.8;
        let beta = std::f64::consts::PI * arg.max(1e-3).sqrt();
        Self { width: j, beta, norm: bessel_i0(beta) }
    }

    fn eval(&self, u: f64) -> f64 {
        let r = 2.0 * u / self.width;
        if r.abs() > 1.0 {
            return 0.0;
        }
        bessel_i0(self.beta * (1.0 - r * r).sqrt()) / self.norm
    }

    /// Continuous Fourier transform of the kernel at `freq` cycles per grid
    /// unit, by composite Simpson quadrature over the (even) kernel support.
    fn spectrum(&self, freq: f64) -> f64 {
        const INTERVALS: usize = 256;
        let half = self.width / 2.0;
        let h = self.width / INTERVALS as f64;
        let f = |u: f64| self.eval(u) * (2.0 * std::f64::consts::PI * u * freq).cos();

        let mut sum = f(-half) + f(half);
        for i in 1..INTERVALS {
            let u = -half + i as f64 * h;
            sum += if i % 2 == 1 { 4.0 * f(u) } else { 2.0 * f(u) };
        }
        sum * h / 3.0
    }
}

pub struct Nufft {
    shape: (usize, usize, usize),
    kd: (usize, usize, usize),
    jd: usize,
    platform: Platform,
    pool: WorkerPool,
    plan: FftPlan3d<f64>,
    #[cfg(feature = "gpu")]
    plan_f32: FftPlan3d<f32>,
    /// Grid index of every image pixel (centred coordinates, wrapped)
    placement: Vec<usize>,
    /// Per-pixel deapodization factor
    deapod: Vec<f64>,
    /// CSR interpolation matrix: sample m uses entries offsets[m]..offsets[m+1]
    offsets: Vec<usize>,
    indices: Vec<usize>,
    weights: Vec<f64>,
    scale: f64,
}

impl std::fmt::Debug for Nufft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nufft")
            .field("shape", &self.shape)
            .field("kd", &self.kd)
            .field("jd", &self.jd)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl Nufft {
    /// Plan a NUFFT for the given trajectory.
    ///
    /// # Arguments
    /// * `locations` - Normalized coordinates `(n_samples, n_dims)` in [-0.5, 0.5)
    /// * `nx`, `ny`, `nz` - Image dimensions
    /// * `platform` - Execution platform
    /// * `kd` - Oversampled grid per frequency axis (defaults to the image size)
    /// * `jd` - Interpolation width (defaults to 1)
    pub fn new(
        locations: &[f64],
        nx: usize, ny: usize, nz: usize,
        platform: Platform,
        kd: Option<&[usize]>,
        jd: Option<usize>,
    ) -> Result<Self> {
        let shape = (nx, ny, nz);
        let n_samples = validate_locations(locations, shape)?;
        let dims = grid_dims(shape);
        let n_dims = dims.len();

        let kd: Vec<usize> = match kd {
            Some(kd) if kd.len() != n_dims => {
                return Err(ReconError::DimensionMismatch { expected: n_dims, got: kd.len() })
            }
            Some(kd) => kd.to_vec(),
            None => dims.clone(),
        };
        if kd.iter().zip(dims.iter()).any(|(&k, &n)| k < n) {
            return Err(ReconError::GridTooSmall { kd, shape: dims });
        }

        let jd = jd.unwrap_or(1);
        if jd == 0 || kd.iter().any(|&k| jd > k) {
            return Err(ReconError::InvalidParameter(format!(
                "interpolation width {} must be in 1..={}",
                jd,
                kd.iter().min().copied().unwrap_or(0)
            )));
        }

        if !backend_available(platform) {
            return Err(ReconError::BackendUnavailable(platform.name()));
        }

        let axes = [nx, ny, nz];
        let grid = [kd[0], kd[1], if n_dims == 3 { kd[2] } else { 1 }];
        let kernels: Vec<KaiserBessel> = (0..n_dims)
            .map(|d| KaiserBessel::new(jd, grid[d] as f64 / axes[d] as f64))
            .collect();

        // Per-axis deapodization and placement
        let mut axis_deapod: Vec<Vec<f64>> = Vec::with_capacity(3);
        let mut axis_place: Vec<Vec<usize>> = Vec::with_capacity(3);
        for d in 0..3 {
            let n = axes[d];
            let k = grid[d];
            let mut deapod = Vec::with_capacity(n);
            let mut place = Vec::with_capacity(n);
            for i in 0..n {
                let c = i as i64 - (n / 2) as i64;
                place.push(c.rem_euclid(k as i64) as usize);
                deapod.push(if jd == 1 || d >= n_dims {
                    1.0
                } else {
                    1.0 / kernels[d].spectrum(c as f64 / k as f64)
                });
            }
            axis_deapod.push(deapod);
            axis_place.push(place);
        }

        let mut placement = Vec::with_capacity(nx * ny * nz);
        let mut deapod = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    placement.push(idx3d(
                        axis_place[0][i], axis_place[1][j], axis_place[2][k],
                        grid[0], grid[1],
                    ));
                    deapod.push(axis_deapod[0][i] * axis_deapod[1][j] * axis_deapod[2][k]);
                }
            }
        }

        // Interpolation stencils
        let mut offsets = Vec::with_capacity(n_samples + 1);
        let mut indices = Vec::new();
        let mut weights = Vec::new();
        offsets.push(0);
        for m in 0..n_samples {
            let mut axis_taps: Vec<Vec<(usize, f64)>> = Vec::with_capacity(3);
            for d in 0..3 {
                if d >= n_dims {
                    axis_taps.push(vec![(0, 1.0)]);
                    continue;
                }
                let k = grid[d] as i64;
                let t = locations[m * n_dims + d] * k as f64;
                let taps = if jd == 1 {
                    vec![((t.round() as i64).rem_euclid(k) as usize, 1.0)]
                } else {
                    let half = jd as f64 / 2.0;
                    let lo = (t - half).ceil() as i64;
                    let hi = (t + half).floor() as i64;
                    (lo..=hi)
                        .map(|g| (g.rem_euclid(k) as usize, kernels[d].eval(t - g as f64)))
                        .collect()
                };
                axis_taps.push(taps);
            }

            for &(gz, wz) in &axis_taps[2] {
                for &(gy, wy) in &axis_taps[1] {
                    for &(gx, wx) in &axis_taps[0] {
                        indices.push(idx3d(gx, gy, gz, grid[0], grid[1]));
                        weights.push(wx * wy * wz);
                    }
                }
            }
            offsets.push(indices.len());
        }

        let pool = WorkerPool::new(match platform {
            Platform::Cpu => 1,
            Platform::MultiCpu | Platform::Gpu => available_workers(),
        });

        tracing::debug!(
            ?shape, ?grid, jd, n_samples, platform = platform.name(),
            "planned NUFFT"
        );

        Ok(Self {
            shape,
            kd: (grid[0], grid[1], grid[2]),
            jd,
            platform,
            pool,
            plan: FftPlan3d::new(grid[0], grid[1], grid[2]),
            #[cfg(feature = "gpu")]
            plan_f32: FftPlan3d::new(grid[0], grid[1], grid[2]),
            placement,
            deapod,
            offsets,
            indices,
            weights,
            scale: 1.0 / ((nx * ny * nz) as f64).sqrt(),
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn oversampled_grid(&self) -> (usize, usize, usize) {
        self.kd
    }

    pub fn kernel_width(&self) -> usize {
        self.jd
    }

    /// Contiguous sample ranges, one per worker
    fn sample_chunks(&self) -> Vec<Range<usize>> {
        let n = self.offsets.len() - 1;
        let chunk = n.div_ceil(self.pool.num_workers()).max(1);
        (0..n).step_by(chunk).map(|start| start..(start + chunk).min(n)).collect()
    }

    fn forward_with<T: FftNum + Into<f64>>(&self, plan: &FftPlan3d<T>, img: &[Complex64]) -> Vec<Complex64> {
        let mut grid = vec![Complex::<T>::zero(); plan.len()];
        for (p, &g) in self.placement.iter().enumerate() {
            let v = img[p] * self.deapod[p];
            grid[g] = Complex::new(scalar(v.re), scalar(v.im));
        }
        plan.forward(&mut grid);

        let grid = &grid;
        let parts = self.pool.map(&self.sample_chunks(), |range| {
            range
                .clone()
                .map(|m| {
                    let mut acc = Complex64::new(0.0, 0.0);
                    for s in self.offsets[m]..self.offsets[m + 1] {
                        let g = grid[self.indices[s]];
                        acc += Complex64::new(g.re.into(), g.im.into()) * self.weights[s];
                    }
                    acc * self.scale
                })
                .collect::<Vec<_>>()
        });
        parts.concat()
    }

    fn adjoint_with<T: FftNum + Into<f64>>(&self, plan: &FftPlan3d<T>, samples: &[Complex64]) -> Vec<Complex64> {
        let n_grid = plan.len();
        let parts = self.pool.map(&self.sample_chunks(), |range| {
            let mut grid = vec![Complex::<T>::zero(); n_grid];
            for m in range.clone() {
                let y = samples[m] * self.scale;
                for s in self.offsets[m]..self.offsets[m + 1] {
                    let w = self.weights[s];
                    let g = &mut grid[self.indices[s]];
                    *g = *g + Complex::new(scalar(y.re * w), scalar(y.im * w));
                }
            }
            grid
        });

        let mut grid = vec![Complex::<T>::zero(); n_grid];
        for part in parts {
            for (g, p) in grid.iter_mut().zip(part) {
                *g = *g + p;
            }
        }
        plan.inverse(&mut grid);

        self.placement
            .iter()
            .zip(self.deapod.iter())
            .map(|(&g, &d)| Complex64::new(grid[g].re.into(), grid[g].im.into()) * d)
            .collect()
    }
}

impl FourierOperator for Nufft {
    fn op(&self, img: &[Complex64]) -> Vec<Complex64> {
        match self.platform {
            #[cfg(feature = "gpu")]
            Platform::Gpu => self.forward_with(&self.plan_f32, img),
            _ => self.forward_with(&self.plan, img),
        }
    }

    fn adj_op(&self, samples: &[Complex64]) -> Vec<Complex64> {
        match self.platform {
            #[cfg(feature = "gpu")]
            Platform::Gpu => self.adjoint_with(&self.plan_f32, samples),
            _ => self.adjoint_with(&self.plan, samples),
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    fn n_samples(&self) -> usize {
        self.offsets.len() - 1
    }
}
