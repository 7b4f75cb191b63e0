use nalgebra::DMatrix;

use crate::errors::SketchError;

/// Local sparse matrix in compressed-column form. Column c's nonzeros live
/// at positions `indptr[c]..indptr[c + 1]` of `indices`/`values`.
#[derive(Clone, Debug, PartialEq)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl CscMatrix {
    /// Takes ownership of externally built buffers, validating the
    /// structure first. This is the ownership-transfer counterpart of a
    /// raw-pointer attach: the matrix owns the buffers from here on.
    pub fn attach(
        indptr: Vec<usize>,
        indices: Vec<usize>,
        values: Vec<f64>,
        nrows: usize,
        ncols: usize,
    ) -> Result<Self, SketchError> {
        if indptr.len() != ncols + 1 {
            return Err(SketchError::SparseOperation(format!(
                "expected {} column offsets for {} columns, got {}",
                ncols + 1,
                ncols,
                indptr.len()
            )));
        }
        if indptr[0] != 0 {
            return Err(SketchError::SparseOperation(format!(
                "column offsets must start at 0, got {}",
                indptr[0]
            )));
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(SketchError::SparseOperation(
                "column offsets must be non-decreasing".to_string(),
            ));
        }
        let nnz = indptr[ncols];
        if indices.len() != nnz || values.len() != nnz {
            return Err(SketchError::SparseOperation(format!(
                "offsets promise {} nonzeros but got {} indices and {} values",
                nnz,
                indices.len(),
                values.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&r| r >= nrows) {
            return Err(SketchError::SparseOperation(format!(
                "row index {} out of range for {} rows",
                bad, nrows
            )));
        }
        Ok(CscMatrix {
            nrows,
            ncols,
            indptr,
            indices,
            values,
        })
    }

    /// Collects the nonzeros of a dense matrix (exact zeros are dropped).
    pub fn from_dense(a: &DMatrix<f64>) -> Self {
        let mut indptr = Vec::with_capacity(a.ncols() + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for col in 0..a.ncols() {
            for row in 0..a.nrows() {
                if a[(row, col)] != 0.0 {
                    indices.push(row);
                    values.push(a[(row, col)]);
                }
            }
            indptr.push(indices.len());
        }
        CscMatrix {
            nrows: a.nrows(),
            ncols: a.ncols(),
            indptr,
            indices,
            values,
        }
    }

    pub fn height(&self) -> usize {
        self.nrows
    }

    pub fn width(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(self.nrows, self.ncols);
        for col in 0..self.ncols {
            for idx in self.indptr[col]..self.indptr[col + 1] {
                out[(self.indices[idx], col)] += self.values[idx];
            }
        }
        out
    }
}
