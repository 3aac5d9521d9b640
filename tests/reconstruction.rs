use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sparse_mri::fourier::{CartesianFft, FourierOperator, Nufft, Platform};
use sparse_mri::gradient::{GradAnalysis, GradSynthesis};
use sparse_mri::linear::HaarWavelet;
use sparse_mri::solvers::{
    sparse_rec_condatvu, sparse_rec_condatvu_with_progress, sparse_rec_fista, CondatVuParams, FistaParams, StdEstMethod,
};

fn random_complex(n: usize, seed: u64) -> Vec<Complex64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

/// Piecewise-constant phantom: a bright square on a dim background
fn phantom(nx: usize, ny: usize) -> Vec<Complex64> {
    let mut img = vec![Complex64::new(0.1, 0.0); nx * ny];
    for j in ny / 4..3 * ny / 4 {
        for i in nx / 4..3 * nx / 4 {
            img[i + j * nx] = Complex64::new(1.0, 0.0);
        }
    }
    img
}

fn assert_close(actual: &[Complex64], expected: &[Complex64], rtol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).norm() <= rtol * e.norm().max(1e-12) + 1e-9,
            "voxel {}: got {}, expected {}", i, a, e
        );
    }
}

#[test]
fn test_fista_fully_sampled_recovers_image() {
    let (nx, ny) = (16, 16);
    let img = phantom(nx, ny);
    let fourier = CartesianFft::full(nx, ny, 1);
    let haar = HaarWavelet::new(nx, ny, 1, 3).unwrap();
    let data = fourier.op(&img);

    let grad = GradSynthesis::new(&data, &fourier, &haar, 1).unwrap();
    let params = FistaParams { mu: 0.0, max_nb_of_iter: 300, atol: 1e-4, ..Default::default() };
    let result = sparse_rec_fista(&grad, &haar, &params).unwrap();

    assert_close(&result.x_final, &img, 1e-3);
}

#[test]
fn test_condatvu_fully_sampled_recovers_image() {
    let (nx, ny) = (16, 16);
    let img = phantom(nx, ny);
    let fourier = CartesianFft::full(nx, ny, 1);
    let haar = HaarWavelet::new(nx, ny, 1, 3).unwrap();
    let data = fourier.op(&img);

    let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();
    let params = CondatVuParams {
        mu: 0.0,
        nb_of_reweights: 0,
        max_nb_of_iter: 300,
        atol: 1e-4,
        ..Default::default()
    };
    let result = sparse_rec_condatvu(&grad, &haar, &params).unwrap();

    assert_close(&result.x_final, &img, 1e-3);
}

#[test]
fn test_fista_undersampled_cost_decreases() {
    let (nx, ny) = (16, 16);
    let img = phantom(nx, ny);
    let mut rng = StdRng::seed_from_u64(7);
    let mask: Vec<u8> = (0..nx * ny).map(|_| rng.gen_bool(0.4) as u8).collect();

    let fourier = CartesianFft::from_mask(&mask, nx, ny, 1).unwrap();
    let haar = HaarWavelet::new(nx, ny, 1, 2).unwrap();
    let data = fourier.op(&img);
    let grad = GradSynthesis::new(&data, &fourier, &haar, 1).unwrap();

    let params = FistaParams { mu: 1e-2, max_nb_of_iter: 100, atol: 0.0, get_cost: true, ..Default::default() };
    let result = sparse_rec_fista(&grad, &haar, &params).unwrap();

    assert_eq!(result.cost.len(), 100);
    let first = result.cost[0];
    let last = *result.cost.last().unwrap();
    assert!(last < first, "cost went from {} to {}", first, last);
    assert!(result.x_final.iter().all(|c| c.re.is_finite() && c.im.is_finite()));
}

#[test]
fn test_fista_cost_non_increasing_when_well_conditioned() {
    let (nx, ny) = (16, 16);
    let img = phantom(nx, ny);
    let fourier = CartesianFft::full(nx, ny, 1);
    let haar = HaarWavelet::new(nx, ny, 1, 2).unwrap();
    let data = fourier.op(&img);
    let grad = GradSynthesis::new(&data, &fourier, &haar, 1).unwrap();

    let params = FistaParams { mu: 0.05, max_nb_of_iter: 40, atol: 0.0, get_cost: true, ..Default::default() };
    let result = sparse_rec_fista(&grad, &haar, &params).unwrap();

    assert_eq!(result.cost.len(), 40);
    for i in 5..result.cost.len() - 1 {
        let (c0, c1) = (result.cost[i], result.cost[i + 1]);
        assert!(c1 <= c0 + 1e-9 * c0.abs().max(1.0), "cost rose at iteration {}: {} -> {}", i + 1, c0, c1);
    }
}

#[test]
fn test_condatvu_reweighting_lowers_cost() {
    let (nx, ny) = (16, 16);
    let img = phantom(nx, ny);
    let fourier = CartesianFft::full(nx, ny, 1);
    let haar = HaarWavelet::new(nx, ny, 1, 3).unwrap();
    let data = fourier.op(&img);
    let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

    let run = |nb_of_reweights: usize| {
        let params = CondatVuParams {
            nb_of_reweights,
            max_nb_of_iter: 200,
            atol: 0.0,
            std_est_method: StdEstMethod::Primal,
            get_cost: true,
            ..Default::default()
        };
        let result = sparse_rec_condatvu(&grad, &haar, &params).unwrap();
        *result.cost.last().unwrap()
    };

    let cost0 = run(0);
    let cost2 = run(2);
    assert!(cost2 <= cost0, "reweighting raised the cost: {} -> {}", cost0, cost2);
}

#[test]
fn test_condatvu_positivity_and_reweighting() {
    let (nx, ny) = (8, 8);
    let img = phantom(nx, ny);
    let mask: Vec<u8> = (0..nx * ny).map(|i| (i % 2 == 0 || i < nx) as u8).collect();

    let fourier = CartesianFft::from_mask(&mask, nx, ny, 1).unwrap();
    let haar = HaarWavelet::new(nx, ny, 1, 2).unwrap();
    let data = fourier.op(&img);
    let grad = GradAnalysis::new(&data, &fourier, 1).unwrap();

    let params = CondatVuParams {
        mu: 0.05,
        nb_of_reweights: 2,
        max_nb_of_iter: 40,
        add_positivity: true,
        atol: 0.0,
        std_est_method: StdEstMethod::Primal,
        ..Default::default()
    };
    let mut last = (0, 0);
    let result = sparse_rec_condatvu_with_progress(&grad, &haar, &params, |i, n| last = (i, n)).unwrap();

    assert_eq!(result.iterations, 120);
    assert_eq!(last, (120, 120));
    assert_eq!(result.transform.as_ref().map(|t| t.len()), Some(nx * ny));
    for c in &result.x_final {
        assert!(c.re >= 0.0);
        assert_eq!(c.im, 0.0);
    }
}

#[test]
fn test_nufft_adjointness() {
    let (nx, ny) = (12, 10);
    let mut rng = StdRng::seed_from_u64(11);
    let locations: Vec<f64> = (0..2 * 80).map(|_| rng.gen_range(-0.5..0.5)).collect();

    let nufft = Nufft::new(&locations, nx, ny, 1, Platform::Cpu, Some(&[24, 20][..]), Some(4)).unwrap();
    let x = random_complex(nx * ny, 1);
    let y = random_complex(nufft.n_samples(), 2);

    let lhs: Complex64 = nufft.op(&x).iter().zip(y.iter()).map(|(a, b)| a * b.conj()).sum();
    let rhs: Complex64 = x.iter().zip(nufft.adj_op(&y).iter()).map(|(a, b)| a * b.conj()).sum();
    assert!((lhs - rhs).norm() < 1e-9 * lhs.norm().max(1.0), "{} vs {}", lhs, rhs);
}
