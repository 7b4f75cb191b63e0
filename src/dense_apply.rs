use nalgebra::DMatrix;

use crate::dist::{Communicator, DenseLayout, DistDenseMatrix};
use crate::errors::SketchError;
use crate::transform::{DenseTransform, HashTransform, SketchDirection};

/// Sketches a distributed dense matrix with a hash operator, never forming
/// the operator. Each rank accumulates its local entries into a full-size
/// buffer, then the buffers are sum-reduced collectively; the result is
/// replicated on every rank.
///
/// Every participating rank must call this with matching metadata and
/// direction. Accumulation order depends on the partitioning, so results
/// across different process counts agree only to rounding error.
pub fn sketch_dist_dense<C: Communicator>(
    transform: &HashTransform,
    a: &DistDenseMatrix,
    direction: SketchDirection,
    comm: &C,
) -> Result<DMatrix<f64>, SketchError> {
    // These checks are replicated-deterministic: every rank sees the same
    // layout, global shape, and metadata, so erroring here cannot strand a
    // peer inside the collective.
    if !matches!(a.layout(), DenseLayout::RowCyclic { .. }) {
        return Err(SketchError::UnsupportedLayout(
            "hash transform supports row-cyclic distributed storage only".to_string(),
        ));
    }
    match direction {
        SketchDirection::Columnwise => {
            if a.height() != transform.get_n() {
                return Err(SketchError::Configuration(format!(
                    "cannot sketch {} rows columnwise with a transform over {} inputs",
                    a.height(),
                    transform.get_n()
                )));
            }
        }
        SketchDirection::Rowwise => {
            if a.width() != transform.get_n() {
                return Err(SketchError::Configuration(format!(
                    "cannot sketch {} columns rowwise with a transform over {} inputs",
                    a.width(),
                    transform.get_n()
                )));
            }
        }
    }

    let local_result = accumulate_local(transform, a, direction);

    // All ranks agree on success before anyone enters the data reduction:
    // a rank that faulted locally still makes this collective call, so its
    // peers cannot block forever waiting for it.
    let mut fault = [if local_result.is_err() { 1.0 } else { 0.0 }];
    comm.allreduce_sum(&mut fault)?;
    if fault[0] != 0.0 {
        return match local_result {
            Err(err) => Err(err),
            Ok(_) => Err(SketchError::Communication(
                "a peer process failed before the reduction".to_string(),
            )),
        };
    }

    let mut part = local_result?;
    comm.allreduce_sum(part.as_mut_slice())?;
    log::debug!(
        "reduced a {}x{} sketch across {} ranks",
        part.nrows(),
        part.ncols(),
        comm.size()
    );
    Ok(part)
}

fn accumulate_local(
    transform: &HashTransform,
    a: &DistDenseMatrix,
    direction: SketchDirection,
) -> Result<DMatrix<f64>, SketchError> {
    let row_idx = transform.row_idx();
    let row_value = transform.row_value();
    let local = a.local();

    match direction {
        SketchDirection::Columnwise => {
            let mut part = DMatrix::zeros(transform.get_s(), a.width());
            for j in 0..a.local_height() {
                let g = a.global_row(j);
                if g >= transform.get_n() {
                    return Err(SketchError::Configuration(format!(
                        "local row {} maps to global row {} outside the transform input range",
                        j, g
                    )));
                }
                let target = row_idx[g];
                let scale = row_value[g];
                for i in 0..a.local_width() {
                    // Running sum: several source rows may share a target.
                    part[(target, a.global_col(i))] += scale * local[(j, i)];
                }
            }
            Ok(part)
        }
        SketchDirection::Rowwise => {
            let mut part = DMatrix::zeros(a.height(), transform.get_s());
            for j in 0..a.local_height() {
                let g = a.global_row(j);
                if g >= a.height() {
                    return Err(SketchError::Configuration(format!(
                        "local row {} maps to global row {} outside the matrix",
                        j, g
                    )));
                }
                for i in 0..a.local_width() {
                    let gc = a.global_col(i);
                    part[(g, row_idx[gc])] += row_value[gc] * local[(j, i)];
                }
            }
            Ok(part)
        }
    }
}

/// Applies a dense-family transform to a local dense matrix. Deterministic
/// for a fixed record: the lazy grid always materializes the same values.
pub fn sketch_local_dense(
    transform: &DenseTransform,
    a: &DMatrix<f64>,
    direction: SketchDirection,
) -> Result<DMatrix<f64>, SketchError> {
    match direction {
        SketchDirection::Columnwise => {
            if a.nrows() != transform.get_n() {
                return Err(SketchError::Configuration(format!(
                    "cannot sketch {} rows columnwise with a transform over {} inputs",
                    a.nrows(),
                    transform.get_n()
                )));
            }
            let mut out = DMatrix::zeros(transform.get_s(), a.ncols());
            for t in 0..transform.get_s() {
                for c in 0..a.ncols() {
                    for i in 0..a.nrows() {
                        out[(t, c)] += transform.value_at(i, t) * a[(i, c)];
                    }
                }
            }
            Ok(out)
        }
        SketchDirection::Rowwise => {
            if a.ncols() != transform.get_n() {
                return Err(SketchError::Configuration(format!(
                    "cannot sketch {} columns rowwise with a transform over {} inputs",
                    a.ncols(),
                    transform.get_n()
                )));
            }
            let mut out = DMatrix::zeros(a.nrows(), transform.get_s());
            for r in 0..a.nrows() {
                for t in 0..transform.get_s() {
                    for i in 0..a.ncols() {
                        out[(r, t)] += a[(r, i)] * transform.value_at(i, t);
                    }
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use super::{sketch_dist_dense, sketch_local_dense};
    use crate::context::{DistributionType, RandomContext};
    use crate::dist::{Communicator, DenseLayout, DistDenseMatrix, SingleProcess};
    use crate::errors::SketchError;
    use crate::test_assist::{explicit_multiply, scattered_operator};
    use crate::transform::{DenseTransform, HashTransform, SketchDirection};

    /// Serial stand-in for a process group: ranks call the collectives in
    /// turn, each call adds into a shared slot, and the last rank to reach
    /// a slot reads the completed sum. Only the last rank's apply output is
    /// meaningful, which is all these tests assert on.
    struct SerialGroup {
        slots: Rc<RefCell<Vec<Vec<f64>>>>,
        nprocs: usize,
    }

    impl SerialGroup {
        fn new(nprocs: usize) -> Self {
            SerialGroup {
                slots: Rc::new(RefCell::new(Vec::new())),
                nprocs,
            }
        }

        fn rank(&self, rank: usize) -> SerialRank {
            SerialRank {
                slots: Rc::clone(&self.slots),
                nprocs: self.nprocs,
                rank,
                cursor: Cell::new(0),
            }
        }
    }

    struct SerialRank {
        slots: Rc<RefCell<Vec<Vec<f64>>>>,
        nprocs: usize,
        rank: usize,
        cursor: Cell<usize>,
    }

    impl Communicator for SerialRank {
        fn size(&self) -> usize {
            self.nprocs
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn allreduce_sum(&self, buf: &mut [f64]) -> Result<(), SketchError> {
            let slot = self.cursor.get();
            self.cursor.set(slot + 1);
            let mut slots = self.slots.borrow_mut();
            if slots.len() <= slot {
                slots.resize(slot + 1, Vec::new());
            }
            let acc = &mut slots[slot];
            if acc.is_empty() {
                acc.resize(buf.len(), 0.0);
            }
            if acc.len() != buf.len() {
                return Err(SketchError::Communication(format!(
                    "buffer length {} does not match the collective's {}",
                    buf.len(),
                    acc.len()
                )));
            }
            for (a, b) in acc.iter_mut().zip(buf.iter()) {
                *a += *b;
            }
            buf.copy_from_slice(acc);
            Ok(())
        }
    }

    fn sequential_matrix(rows: usize, cols: usize) -> DMatrix<f64> {
        // Column-major fill with 1, 2, 3, ... like the original unit test.
        let mut count = 0.0;
        DMatrix::from_fn(rows, cols, |_, _| {
            count += 1.0;
            count
        })
    }

    #[test]
    fn columnwise_matches_explicit_multiply_exactly() {
        let (n, m, s) = (10, 5, 6);
        let a_global = sequential_matrix(n, m);
        let a = DistDenseMatrix::partition(&a_global, 0, 1).unwrap();

        let mut ctx = RandomContext::new(0);
        let transform = HashTransform::new(n, s, &mut ctx).unwrap();
        let sketch =
            sketch_dist_dense(&transform, &a, SketchDirection::Columnwise, &SingleProcess).unwrap();

        let expected = explicit_multiply(&scattered_operator(&transform), &a_global);
        assert_eq!(sketch, expected);
        assert_eq!(sketch.nrows(), s);
        assert_eq!(sketch.ncols(), m);
    }

    #[test]
    fn rowwise_matches_explicit_multiply_exactly() {
        let (n, m, s) = (10, 5, 3);
        let a_global = sequential_matrix(n, m);
        let a = DistDenseMatrix::partition(&a_global, 0, 1).unwrap();

        let mut ctx = RandomContext::new(0);
        let transform = HashTransform::new(m, s, &mut ctx).unwrap();
        let sketch =
            sketch_dist_dense(&transform, &a, SketchDirection::Rowwise, &SingleProcess).unwrap();

        let expected = explicit_multiply(&a_global, &scattered_operator(&transform).transpose());
        assert_eq!(sketch, expected);
        assert_eq!(sketch.nrows(), n);
        assert_eq!(sketch.ncols(), s);
    }

    #[test]
    fn partitioned_apply_agrees_with_the_explicit_product() {
        let (n, m, s) = (23, 7, 9);
        let a_global = crate::test_assist::generate_random_matrix(17, n, m);
        let mut ctx = RandomContext::new(4);
        let transform = HashTransform::new(n, s, &mut ctx).unwrap();
        let expected = explicit_multiply(&scattered_operator(&transform), &a_global);

        for nprocs in [1, 2, 3] {
            let group = SerialGroup::new(nprocs);
            let mut last = None;
            for rank in 0..nprocs {
                let part = DistDenseMatrix::partition(&a_global, rank, nprocs).unwrap();
                let comm = group.rank(rank);
                last = Some(
                    sketch_dist_dense(&transform, &part, SketchDirection::Columnwise, &comm)
                        .unwrap(),
                );
            }
            let sketch = last.unwrap();
            assert_relative_eq!(sketch, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn blocked_layout_is_rejected() {
        let local = DMatrix::zeros(4, 3);
        let a = DistDenseMatrix::new(local, DenseLayout::Blocked, 4, 3).unwrap();
        let mut ctx = RandomContext::new(0);
        let transform = HashTransform::new(4, 2, &mut ctx).unwrap();
        assert!(matches!(
            sketch_dist_dense(&transform, &a, SketchDirection::Columnwise, &SingleProcess),
            Err(SketchError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let a_global = sequential_matrix(8, 4);
        let a = DistDenseMatrix::partition(&a_global, 0, 1).unwrap();
        let mut ctx = RandomContext::new(0);
        let transform = HashTransform::new(5, 2, &mut ctx).unwrap();
        assert!(matches!(
            sketch_dist_dense(&transform, &a, SketchDirection::Columnwise, &SingleProcess),
            Err(SketchError::Configuration(_))
        ));
        assert!(matches!(
            sketch_dist_dense(&transform, &a, SketchDirection::Rowwise, &SingleProcess),
            Err(SketchError::Configuration(_))
        ));
    }

    /// Group where some other rank has already flagged a local fault: the
    /// one-element flag reduction comes back nonzero, the data reduction
    /// never runs.
    struct FaultedPeer {
        data_reductions: Cell<usize>,
    }

    impl Communicator for FaultedPeer {
        fn size(&self) -> usize {
            2
        }

        fn rank(&self) -> usize {
            0
        }

        fn allreduce_sum(&self, buf: &mut [f64]) -> Result<(), SketchError> {
            if buf.len() == 1 {
                buf[0] += 1.0;
            } else {
                self.data_reductions.set(self.data_reductions.get() + 1);
            }
            Ok(())
        }
    }

    #[test]
    fn peer_fault_aborts_before_the_data_reduction() {
        let a_global = sequential_matrix(6, 3);
        let a = DistDenseMatrix::partition(&a_global, 0, 1).unwrap();
        let mut ctx = RandomContext::new(0);
        let transform = HashTransform::new(6, 4, &mut ctx).unwrap();

        let comm = FaultedPeer {
            data_reductions: Cell::new(0),
        };
        let result = sketch_dist_dense(&transform, &a, SketchDirection::Columnwise, &comm);
        match result {
            Err(SketchError::Communication(msg)) => assert!(msg.contains("peer")),
            other => panic!("expected a communication error, got {:?}", other.map(|_| ())),
        }
        // The healthy rank must not have entered the data collective.
        assert_eq!(comm.data_reductions.get(), 0);
    }

    /// Group whose collectives fail outright.
    struct BrokenGroup;

    impl Communicator for BrokenGroup {
        fn size(&self) -> usize {
            2
        }

        fn rank(&self) -> usize {
            0
        }

        fn allreduce_sum(&self, _buf: &mut [f64]) -> Result<(), SketchError> {
            Err(SketchError::Communication(
                "collective aborted by the runtime".to_string(),
            ))
        }
    }

    #[test]
    fn failed_collective_surfaces_a_communication_error() {
        let a_global = sequential_matrix(6, 3);
        let a = DistDenseMatrix::partition(&a_global, 0, 1).unwrap();
        let mut ctx = RandomContext::new(0);
        let transform = HashTransform::new(6, 4, &mut ctx).unwrap();

        assert!(matches!(
            sketch_dist_dense(&transform, &a, SketchDirection::Columnwise, &BrokenGroup),
            Err(SketchError::Communication(_))
        ));
    }

    #[test]
    fn dense_gaussian_apply_is_deterministic_per_seed() {
        let a = sequential_matrix(12, 4);
        let mut ctx1 = RandomContext::new(42);
        let t1 = DenseTransform::new(12, 5, &mut ctx1, DistributionType::Gaussian).unwrap();
        let mut ctx2 = RandomContext::new(42);
        let t2 = DenseTransform::new(12, 5, &mut ctx2, DistributionType::Gaussian).unwrap();

        let first = sketch_local_dense(&t1, &a, SketchDirection::Columnwise).unwrap();
        let second = sketch_local_dense(&t2, &a, SketchDirection::Columnwise).unwrap();
        assert_eq!(first, second);

        // The same object applied twice is also stable.
        let third = sketch_local_dense(&t1, &a, SketchDirection::Columnwise).unwrap();
        assert_eq!(first, third);
    }

    #[test]
    fn dense_apply_matches_the_materialized_operator() {
        let a = crate::test_assist::generate_random_matrix(3, 10, 6);
        let mut ctx = RandomContext::new(8);
        let t = DenseTransform::new(10, 4, &mut ctx, DistributionType::Gaussian).unwrap();

        let mut omega = DMatrix::zeros(4, 10);
        for i in 0..10 {
            for j in 0..4 {
                omega[(j, i)] = t.value_at(i, j);
            }
        }
        let sketch = sketch_local_dense(&t, &a, SketchDirection::Columnwise).unwrap();
        assert_relative_eq!(sketch, &omega * &a, epsilon = 1e-12);

        let mut ctx_r = RandomContext::new(8);
        let t_r = DenseTransform::new(6, 4, &mut ctx_r, DistributionType::Gaussian).unwrap();
        let mut omega_r = DMatrix::zeros(6, 4);
        for i in 0..6 {
            for j in 0..4 {
                omega_r[(i, j)] = t_r.value_at(i, j);
            }
        }
        let sketch_r = sketch_local_dense(&t_r, &a, SketchDirection::Rowwise).unwrap();
        assert_relative_eq!(sketch_r, &a * &omega_r, epsilon = 1e-12);
    }
}
