use crate::errors::SketchError;
use crate::sparse::CscMatrix;
use crate::transform::{HashTransform, SketchDirection};

// Sentinel for "target not yet seen in the current output column".
const UNSEEN: usize = usize::MAX;

/// Sketches a local compressed-column matrix with a hash operator,
/// producing a fresh compressed-column result with no duplicate (row, col)
/// entries. The operator is never formed densely.
pub fn sketch_sparse(
    transform: &HashTransform,
    a: &CscMatrix,
    direction: SketchDirection,
) -> Result<CscMatrix, SketchError> {
    match direction {
        SketchDirection::Columnwise => apply_columnwise(transform, a),
        SketchDirection::Rowwise => apply_rowwise(transform, a),
    }
}

/// Pi * A: rows of A are scattered to `row_idx` targets. One pass over the
/// columns; entries of a column that hash to the same target row are summed
/// through the seen-map, and only the map entries touched by the column are
/// reset afterwards, so the reset cost is bounded by the column's nonzeros.
fn apply_columnwise(transform: &HashTransform, a: &CscMatrix) -> Result<CscMatrix, SketchError> {
    if a.height() != transform.get_n() {
        return Err(SketchError::Configuration(format!(
            "cannot sketch {} rows columnwise with a transform over {} inputs",
            a.height(),
            transform.get_n()
        )));
    }

    let row_idx = transform.row_idx();
    let row_value = transform.row_value();
    let indptr = a.indptr();
    let indices = a.indices();
    let values = a.values();

    let n_rows = transform.get_s();
    let n_cols = a.width();

    let mut nnz = 0;
    let mut indptr_new = vec![0usize; n_cols + 1];
    let mut final_rows = vec![0usize; a.nnz()];
    let mut final_vals = vec![0f64; a.nnz()];

    let mut idx_map = vec![UNSEEN; n_rows];

    for col in 0..n_cols {
        for idx in indptr[col]..indptr[col + 1] {
            let row = indices[idx];
            let val = values[idx] * row_value[row];
            let target = row_idx[row];

            if idx_map[target] == UNSEEN {
                idx_map[target] = nnz;
                final_rows[nnz] = target;
                final_vals[nnz] = val;
                nnz += 1;
            } else {
                final_vals[idx_map[target]] += val;
            }
        }

        indptr_new[col + 1] = nnz;

        // Reset only what this column touched.
        for i in indptr_new[col]..nnz {
            idx_map[final_rows[i]] = UNSEEN;
        }
    }

    final_rows.truncate(nnz);
    final_vals.truncate(nnz);
    log::debug!(
        "columnwise sparse sketch: {} -> {} nonzeros over {} columns",
        a.nnz(),
        nnz,
        n_cols
    );
    CscMatrix::attach(indptr_new, final_rows, final_vals, n_rows, n_cols)
}

/// A * Pi^T: columns of A are scattered to target columns. The storage is
/// column-major, so the pass runs over *target* columns, visiting every
/// source column that hashes to the target through a one-time inverse
/// index; within a target, rows are deduplicated with the same seen-map
/// pattern as the columnwise pass.
fn apply_rowwise(transform: &HashTransform, a: &CscMatrix) -> Result<CscMatrix, SketchError> {
    if a.width() != transform.get_n() {
        return Err(SketchError::Configuration(format!(
            "cannot sketch {} columns rowwise with a transform over {} inputs",
            a.width(),
            transform.get_n()
        )));
    }

    let row_idx = transform.row_idx();
    let row_value = transform.row_value();
    let indptr = a.indptr();
    let indices = a.indices();
    let values = a.values();

    let n_rows = a.height();
    let n_cols = transform.get_s();

    let mut nnz = 0;
    let mut indptr_new = vec![0usize; n_cols + 1];
    let mut final_rows = vec![0usize; a.nnz()];
    let mut final_vals = vec![0f64; a.nnz()];

    // Inverse of the hash: target column -> source columns, built once.
    let mut inv_mapping: Vec<Vec<usize>> = vec![Vec::new(); n_cols];
    for (col, &target) in row_idx.iter().enumerate() {
        inv_mapping[target].push(col);
    }

    let mut idx_map = vec![UNSEEN; n_rows];

    for target_col in 0..n_cols {
        for &col in &inv_mapping[target_col] {
            for idx in indptr[col]..indptr[col + 1] {
                let row = indices[idx];
                let val = values[idx] * row_value[col];

                if idx_map[row] == UNSEEN {
                    idx_map[row] = nnz;
                    final_rows[nnz] = row;
                    final_vals[nnz] = val;
                    nnz += 1;
                } else {
                    final_vals[idx_map[row]] += val;
                }
            }
        }

        indptr_new[target_col + 1] = nnz;

        for i in indptr_new[target_col]..nnz {
            idx_map[final_rows[i]] = UNSEEN;
        }
    }

    final_rows.truncate(nnz);
    final_vals.truncate(nnz);
    log::debug!(
        "rowwise sparse sketch: {} -> {} nonzeros over {} target columns",
        a.nnz(),
        nnz,
        n_cols
    );
    CscMatrix::attach(indptr_new, final_rows, final_vals, n_rows, n_cols)
}
