use nalgebra::RealField;
use nalgebra_sparse::CsrMatrix;

/// Sparse Kronecker product `a (x) b`.
///
/// Entry `(i_a * m_b + i_b, j_a * n_b + j_b)` of the result is `a[i_a, j_a] * b[i_b, j_b]`,
/// where `b` is `m_b x n_b`. In other words, the index of `a` varies slowest.
pub fn kronecker_product<T: RealField>(a: &CsrMatrix<T>, b: &CsrMatrix<T>) -> CsrMatrix<T> {
    let nrows = a.nrows() * b.nrows();
    let ncols = a.ncols() * b.ncols();
    let nnz = a.nnz() * b.nnz();

    let mut row_offsets = Vec::with_capacity(nrows + 1);
    let mut col_indices = Vec::with_capacity(nnz);
    let mut values = Vec::with_capacity(nnz);
    row_offsets.push(0);

    for row_a in a.row_iter() {
        for row_b in b.row_iter() {
            for (&col_a, val_a) in row_a.col_indices().iter().zip(row_a.values()) {
                for (&col_b, val_b) in row_b.col_indices().iter().zip(row_b.values()) {
                    col_indices.push(col_a * b.ncols() + col_b);
                    values.push(val_a.clone() * val_b.clone());
                }
            }
            row_offsets.push(col_indices.len());
        }
    }

    CsrMatrix::try_from_csr_data(nrows, ncols, row_offsets, col_indices, values)
        .expect("Column indices are sorted and in bounds by construction")
}

/// Computes `alpha * (a (x) b)`.
pub fn scaled_kronecker_product<T: RealField>(alpha: T, a: &CsrMatrix<T>, b: &CsrMatrix<T>) -> CsrMatrix<T> {
    let mut product = kronecker_product(a, b);
    for v in product.values_mut() {
        *v *= alpha.clone();
    }
    product
}
