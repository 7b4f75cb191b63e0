use nalgebra::DMatrix;

use crate::errors::SketchError;

/// How a distributed dense matrix is laid out across ranks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenseLayout {
    /// Rows dealt cyclically across ranks, columns replicated: local row j
    /// holds global row `shift + stride * j`. This is the only layout the
    /// hash apply path handles.
    RowCyclic { shift: usize, stride: usize },
    /// Two-dimensional block layouts; the apply path rejects these.
    Blocked,
}

/// One rank's view of a distributed dense matrix: the local partition plus
/// the mapping from local to global indices. The storage runtime itself is
/// an external collaborator; this is the surface the engine consumes.
pub struct DistDenseMatrix {
    local: DMatrix<f64>,
    layout: DenseLayout,
    global_rows: usize,
    global_cols: usize,
}

impl DistDenseMatrix {
    pub fn new(
        local: DMatrix<f64>,
        layout: DenseLayout,
        global_rows: usize,
        global_cols: usize,
    ) -> Result<Self, SketchError> {
        if let DenseLayout::RowCyclic { shift, stride } = layout {
            if stride == 0 || shift >= stride {
                return Err(SketchError::Configuration(format!(
                    "row-cyclic layout needs shift < stride, got shift {} stride {}",
                    shift, stride
                )));
            }
            let owned = (global_rows + stride - 1 - shift) / stride;
            if local.nrows() != owned || local.ncols() != global_cols {
                return Err(SketchError::Configuration(format!(
                    "local partition is {}x{} but the layout owns {}x{}",
                    local.nrows(),
                    local.ncols(),
                    owned,
                    global_cols
                )));
            }
        }
        Ok(DistDenseMatrix {
            local,
            layout,
            global_rows,
            global_cols,
        })
    }

    /// Builds rank `rank`'s row-cyclic partition of a replicated matrix.
    pub fn partition(
        global: &DMatrix<f64>,
        rank: usize,
        nprocs: usize,
    ) -> Result<Self, SketchError> {
        if nprocs == 0 || rank >= nprocs {
            return Err(SketchError::Configuration(format!(
                "rank {} out of range for {} processes",
                rank, nprocs
            )));
        }
        let rows: Vec<usize> = (rank..global.nrows()).step_by(nprocs).collect();
        let local = DMatrix::from_fn(rows.len(), global.ncols(), |j, i| global[(rows[j], i)]);
        DistDenseMatrix::new(
            local,
            DenseLayout::RowCyclic {
                shift: rank,
                stride: nprocs,
            },
            global.nrows(),
            global.ncols(),
        )
    }

    pub fn local(&self) -> &DMatrix<f64> {
        &self.local
    }

    pub fn layout(&self) -> DenseLayout {
        self.layout
    }

    /// Global row count.
    pub fn height(&self) -> usize {
        self.global_rows
    }

    /// Global column count.
    pub fn width(&self) -> usize {
        self.global_cols
    }

    pub fn local_height(&self) -> usize {
        self.local.nrows()
    }

    pub fn local_width(&self) -> usize {
        self.local.ncols()
    }

    /// Global index of local row j. Identity for layouts without a row
    /// mapping; those never reach the apply loops.
    pub fn global_row(&self, j: usize) -> usize {
        match self.layout {
            DenseLayout::RowCyclic { shift, stride } => shift + stride * j,
            DenseLayout::Blocked => j,
        }
    }

    /// Global index of local column i (columns are replicated).
    pub fn global_col(&self, i: usize) -> usize {
        i
    }
}

/// Blocking collective operations over the cooperating process group.
/// Every participant must call each collective the same number of times
/// with equally-sized buffers; implementations report failures as
/// `SketchError::Communication`.
pub trait Communicator {
    fn size(&self) -> usize;

    fn rank(&self) -> usize;

    /// Element-wise sum across all participants; every caller's buffer
    /// holds the reduced result afterwards.
    fn allreduce_sum(&self, buf: &mut [f64]) -> Result<(), SketchError>;
}

/// The one-process group: every collective is an identity.
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn size(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn allreduce_sum(&self, _buf: &mut [f64]) -> Result<(), SketchError> {
        Ok(())
    }
}
