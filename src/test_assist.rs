use nalgebra::DMatrix;
use rand::Rng;
use rand_123::rng::ThreeFry2x64Rng;
use rand_core::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::sparse::CscMatrix;
use crate::transform::HashTransform;

/// Generates a random matrix of size (rows, cols) with normally distributed elems
pub fn generate_random_matrix(seed: u64, rows: usize, cols: usize) -> DMatrix<f64> {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut rng = ThreeFry2x64Rng::seed_from_u64(seed);
    let data: Vec<f64> = (0..rows * cols).map(|_| normal.sample(&mut rng)).collect();
    DMatrix::from_vec(rows, cols, data)
}

/// Generates a random CSC matrix where each entry is nonzero with the given
/// probability, drawn from a standard normal.
pub fn generate_random_csc(seed: u64, rows: usize, cols: usize, density: f64) -> CscMatrix {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut rng = ThreeFry2x64Rng::seed_from_u64(seed);
    let mut indptr = Vec::with_capacity(cols + 1);
    let mut indices = Vec::new();
    let mut values = Vec::new();
    indptr.push(0);
    for _col in 0..cols {
        for row in 0..rows {
            if rng.gen::<f64>() < density {
                indices.push(row);
                values.push(normal.sample(&mut rng));
            }
        }
        indptr.push(indices.len());
    }
    CscMatrix::attach(indptr, indices, values, rows, cols).unwrap()
}

/// The explicit S x N scattered operator Pi, for comparing the on-the-fly
/// apply paths against a real matrix product.
pub fn scattered_operator(transform: &HashTransform) -> DMatrix<f64> {
    let mut pi = DMatrix::zeros(transform.get_s(), transform.get_n());
    for (i, (&target, &value)) in transform
        .row_idx()
        .iter()
        .zip(transform.row_value().iter())
        .enumerate()
    {
        pi[(target, i)] = value;
    }
    pi
}

/// Plain triple-loop product summing over k in ascending order — the same
/// scalar arithmetic and order as the apply paths, so comparisons against
/// it can demand exact equality.
pub fn explicit_multiply(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    assert_eq!(a.ncols(), b.nrows());
    let mut out = DMatrix::zeros(a.nrows(), b.ncols());
    for i in 0..a.nrows() {
        for j in 0..b.ncols() {
            for k in 0..a.ncols() {
                if a[(i, k)] != 0.0 {
                    out[(i, j)] += a[(i, k)] * b[(k, j)];
                }
            }
        }
    }
    out
}

pub fn check_approx_equal(a: &DMatrix<f64>, b: &DMatrix<f64>, tolerance: f64) -> bool {
    if a.shape() != b.shape() {
        return false;
    }

    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            if (a[(i, j)] - b[(i, j)]).abs() > tolerance {
                return false;
            }
        }
    }

    true
}
