use nalgebra::DMatrix;

use crate::dense_apply::sketch_dist_dense;
use crate::dist::{Communicator, DistDenseMatrix};
use crate::errors::SketchError;
use crate::sparse::CscMatrix;
use crate::sparse_apply::sketch_sparse;
use crate::transform::{HashTransform, SketchDirection};

/// The matrix kinds a hash transform can be applied to. The set is closed:
/// dispatch is a match over (kind, direction), not open-ended.
pub enum SketchInput<'a> {
    DistDense(&'a DistDenseMatrix),
    Sparse(&'a CscMatrix),
}

/// A sketch in the storage kind matching its input.
pub enum Sketch {
    Dense(DMatrix<f64>),
    Sparse(CscMatrix),
}

/// Applies the transform to the input in the given direction. Distributed
/// dense inputs go through the collective path (all ranks must call
/// together); sparse inputs are local.
pub fn apply<C: Communicator>(
    transform: &HashTransform,
    input: SketchInput<'_>,
    direction: SketchDirection,
    comm: &C,
) -> Result<Sketch, SketchError> {
    match input {
        SketchInput::DistDense(a) => {
            Ok(Sketch::Dense(sketch_dist_dense(transform, a, direction, comm)?))
        }
        SketchInput::Sparse(a) => Ok(Sketch::Sparse(sketch_sparse(transform, a, direction)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply, Sketch, SketchInput};
    use crate::context::RandomContext;
    use crate::dist::{DistDenseMatrix, SingleProcess};
    use crate::test_assist::{generate_random_csc, generate_random_matrix};
    use crate::transform::{HashTransform, SketchDirection};

    #[test]
    fn dispatch_preserves_the_storage_kind() {
        let mut ctx = RandomContext::new(0);
        let transform = HashTransform::new(16, 4, &mut ctx).unwrap();

        let dense_global = generate_random_matrix(1, 16, 5);
        let dense = DistDenseMatrix::partition(&dense_global, 0, 1).unwrap();
        let out = apply(
            &transform,
            SketchInput::DistDense(&dense),
            SketchDirection::Columnwise,
            &SingleProcess,
        )
        .unwrap();
        match out {
            Sketch::Dense(m) => {
                assert_eq!(m.nrows(), 4);
                assert_eq!(m.ncols(), 5);
            }
            Sketch::Sparse(_) => panic!("dense input must sketch to dense"),
        }

        let sparse = generate_random_csc(2, 16, 5, 0.3);
        let out = apply(
            &transform,
            SketchInput::Sparse(&sparse),
            SketchDirection::Columnwise,
            &SingleProcess,
        )
        .unwrap();
        match out {
            Sketch::Sparse(m) => {
                assert_eq!(m.height(), 4);
                assert_eq!(m.width(), 5);
            }
            Sketch::Dense(_) => panic!("sparse input must sketch to sparse"),
        }
    }
}
