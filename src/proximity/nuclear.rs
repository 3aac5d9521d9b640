//! Patch-based nuclear norm (locally low rank)
//!
//! Each patch is arranged as a `(voxels, channels)` matrix whose singular
//! values are soft-thresholded. In `Image` mode the patches are spatial
//! blocks of the channel-major image stack; in `Sparse` mode each wavelet
//! band, gathered across channels, is one matrix.
//!
//! Patches are independent, so they are processed on a `WorkerPool` built with the operator; the result
//! does not depend on the number of workers.

use nalgebra::DMatrix;
use num_complex::Complex64;

use super::ProximityOperator;
use crate::error::{ReconError, Result};
use crate::linear::LinearOperator;
use crate::parallel::WorkerPool;
use crate::patches::PatchGrid;

const EPS: f64 = f32::EPSILON as f64;

/// How the data is split into low-rank matrices
#[derive(Clone, Debug)]
pub enum NuclearMode {
    /// Spatial patches of the image stack
    Image { grid: PatchGrid },
    /// One matrix per band of a linear transform
    Sparse { band_sizes: Vec<usize> },
}

impl NuclearMode {
    /// Resolve a mode name (`"image"` or `"sparse"`)
    ///
    /// `"sparse"` reads the band layout from `linear`, which is then required.
    pub fn from_name(
        name: &str,
        shape: (usize, usize, usize),
        patch_shape: (usize, usize, usize),
        overlap: usize,
        linear: Option<&dyn LinearOperator>,
    ) -> Result<Self> {
        match name {
            "image" => Ok(NuclearMode::Image { grid: PatchGrid::new(shape, patch_shape, overlap)? }),
            "sparse" => {
                let linear = linear.ok_or(ReconError::MissingLinearOperator("sparse nuclear norm"))?;
                Ok(NuclearMode::Sparse { band_sizes: linear.band_sizes() })
            }
            other => Err(ReconError::UnknownMode {
                operator: "nuclear norm",
                value: other.to_string(),
            }),
        }
    }
}

pub struct NuclearNorm {
    weights: f64,
    mode: NuclearMode,
    n_channels: usize,
    pool: WorkerPool,
}

impl NuclearNorm {
    pub fn new(weights: f64, mode: NuclearMode, n_channels: usize, num_workers: usize) -> Result<Self> {
        if weights < 0.0 {
            return Err(ReconError::NegativeWeight);
        }
        if n_channels == 0 {
            return Err(ReconError::InvalidParameter("n_channels must be at least 1".into()));
        }
        Ok(Self { weights, mode, n_channels, pool: WorkerPool::new(num_workers) })
    }

    /// Items processed independently: patch indices or band ranges
    fn blocks(&self) -> Vec<Block> {
        match &self.mode {
            NuclearMode::Image { grid } => (0..grid.n_patches()).map(Block::Patch).collect(),
            NuclearMode::Sparse { band_sizes } => {
                let mut offset = 0;
                band_sizes
                    .iter()
                    .map(|&len| {
                        let block = Block::Band { offset, len };
                        offset += len;
                        block
                    })
                    .collect()
            }
        }
    }

    /// Per-channel length of the data this operator expects
    fn channel_len(&self) -> usize {
        match &self.mode {
            NuclearMode::Image { grid } => grid.image_len(),
            NuclearMode::Sparse { band_sizes } => band_sizes.iter().sum(),
        }
    }

    /// Gather a block as a `(voxels, channels)` matrix
    fn gather(&self, data: &[Complex64], block: &Block) -> DMatrix<Complex64> {
        let n = self.channel_len();
        let columns: Vec<Complex64> = (0..self.n_channels)
            .flat_map(|c| {
                let channel = &data[c * n..(c + 1) * n];
                match (block, &self.mode) {
                    (Block::Patch(p), NuclearMode::Image { grid }) => grid.extract(channel, *p),
                    (Block::Band { offset, len }, _) => channel[*offset..offset + len].to_vec(),
                    (Block::Patch(_), NuclearMode::Sparse { .. }) => Vec::new(),
                }
            })
            .collect();
        let rows = columns.len() / self.n_channels;
        DMatrix::from_column_slice(rows, self.n_channels, &columns)
    }
}

#[derive(Clone, Copy, Debug)]
enum Block {
    Patch(usize),
    Band { offset: usize, len: usize },
}

/// Soft-threshold the singular values of `m`
fn prox_nuclear(m: DMatrix<Complex64>, threshold: f64) -> DMatrix<Complex64> {
    let mut svd = m.clone().svd(true, true);
    for s in svd.singular_values.iter_mut() {
        *s *= (1.0 - threshold / s.abs().max(EPS)).max(0.0);
    }
    match svd.recompose() {
        Ok(low_rank) => low_rank,
        Err(err) => {
            tracing::warn!(err, "SVD recomposition failed, leaving patch unchanged");
            m
        }
    }
}

fn nuclear_norm(m: DMatrix<Complex64>) -> f64 {
    m.singular_values().iter().map(|s| s.abs()).sum()
}

impl ProximityOperator for NuclearNorm {
    fn op(&self, data: &[Complex64], extra_factor: f64) -> Vec<Complex64> {
        let threshold = self.weights * extra_factor;
        let blocks = self.blocks();
        let processed = self.pool.map(&blocks, |block| {
            prox_nuclear(self.gather(data, block), threshold)
        });

        let n = self.channel_len();
        let mut out = vec![Complex64::new(0.0, 0.0); data.len()];
        match &self.mode {
            NuclearMode::Image { grid } => {
                for c in 0..self.n_channels {
                    let patches: Vec<Vec<Complex64>> = processed
                        .iter()
                        .map(|m| m.column(c).iter().copied().collect())
                        .collect();
                    out[c * n..(c + 1) * n].copy_from_slice(&grid.reconstruct(&patches));
                }
            }
            NuclearMode::Sparse { .. } => {
                for (block, m) in blocks.iter().zip(processed.iter()) {
                    if let Block::Band { offset, len } = *block {
                        for c in 0..self.n_channels {
                            let start = c * n + offset;
                            for (dst, src) in out[start..start + len].iter_mut().zip(m.column(c).iter()) {
                                *dst = *src;
                            }
                        }
                    }
                }
            }
        }
        out
    }

    fn cost(&self, data: &[Complex64]) -> f64 {
        let blocks = self.blocks();
        let norms = self.pool.map(&blocks, |block| nuclear_norm(self.gather(data, block)));
        self.weights * norms.iter().sum::<f64>()
    }
}
