//! Elimination of constrained degrees of freedom.
use nalgebra::{DVector, RealField};
use nalgebra_sparse::CsrMatrix;

fn membership(n: usize, indices: &[usize]) -> Vec<bool> {
    let mut is_constrained = vec![false; n];
    for &idx in indices {
        is_constrained[idx] = true;
    }
    is_constrained
}

/// Removes all entries in the rows and columns of the given indices and places `1` on their
/// diagonal.
///
/// The result contains no explicitly stored zeros in the eliminated rows and columns, so
/// eliminating the same indices again returns an identical matrix.
///
/// # Panics
///
/// Panics if the matrix is not square or an index is out of bounds.
pub fn eliminate_rows_and_columns<T: RealField>(matrix: &CsrMatrix<T>, indices: &[usize]) -> CsrMatrix<T> {
    assert_eq!(matrix.nrows(), matrix.ncols(), "Matrix must be square.");
    let n = matrix.nrows();
    let is_constrained = membership(n, indices);

    let mut row_offsets = Vec::with_capacity(n + 1);
    let mut col_indices = Vec::with_capacity(matrix.nnz());
    let mut values = Vec::with_capacity(matrix.nnz());
    row_offsets.push(0);

    for (i, row) in matrix.row_iter().enumerate() {
        if is_constrained[i] {
            col_indices.push(i);
            values.push(T::one());
        } else {
            for (&j, v) in row.col_indices().iter().zip(row.values()) {
                if !is_constrained[j] {
                    col_indices.push(j);
                    values.push(v.clone());
                }
            }
        }
        row_offsets.push(col_indices.len());
    }

    CsrMatrix::try_from_csr_data(n, n, row_offsets, col_indices, values)
        .expect("Filtering sorted rows preserves a valid CSR structure")
}

/// Sets the given entries of `vector` to zero.
pub fn zero_constrained_entries<T: RealField>(vector: &mut DVector<T>, indices: &[usize]) {
    for &idx in indices {
        vector[idx] = T::zero();
    }
}
