// Compressed sparse row storage for Hermitian operators.

use crate::core::traits::{LinearOperator, Scalar};
use crate::error::{KpmError, Result};

use faer::sparse::{
    SparseRowMat,            // owning numeric CSR alias
    SymbolicSparseRowMat,    // owning symbolic CSR alias
};
use faer::traits::ComplexField;

/// Matrices with fewer rows than this are multiplied serially even with `rayon` enabled.
pub const PARALLEL_ROWS: usize = 2048;

/// Sparse matrix in CSR format with sorted, duplicate-free rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<S> {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<S>,
}

impl<S: Scalar> CsrMatrix<S> {
    /// Build a CSR from raw row-ptr, col-idx, and values.
    ///
    /// Column indices inside a row may come in any order; duplicates are summed.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<S>,
    ) -> Result<Self> {
        if row_ptr.len() != nrows + 1 {
            return Err(KpmError::InvalidOperator(format!(
                "row_ptr has length {} but {} rows need {}",
                row_ptr.len(),
                nrows,
                nrows + 1
            )));
        }
        if col_idx.len() != values.len() {
            return Err(KpmError::InvalidOperator(format!(
                "{} column indices but {} values",
                col_idx.len(),
                values.len()
            )));
        }
        if row_ptr[0] != 0 || row_ptr[nrows] != col_idx.len() {
            return Err(KpmError::InvalidOperator(
                "row_ptr must start at 0 and end at nnz".to_string(),
            ));
        }
        if row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(KpmError::InvalidOperator(
                "row_ptr must be non-decreasing".to_string(),
            ));
        }
        if let Some(&c) = col_idx.iter().find(|&&c| c >= ncols) {
            return Err(KpmError::InvalidOperator(format!(
                "column index {} out of range for {} columns",
                c, ncols
            )));
        }

        let mut out_ptr = Vec::with_capacity(nrows + 1);
        let mut out_cols = Vec::with_capacity(col_idx.len());
        let mut out_vals = Vec::with_capacity(values.len());
        out_ptr.push(0);
        let mut row: Vec<(usize, S)> = Vec::new();
        for i in 0..nrows {
            row.clear();
            row.extend((row_ptr[i]..row_ptr[i + 1]).map(|k| (col_idx[k], values[k])));
            row.sort_by_key(|&(c, _)| c);
            let row_start = out_cols.len();
            for &(c, v) in &row {
                let len = out_cols.len();
                if len > row_start && out_cols[len - 1] == c {
                    out_vals[len - 1] += v;
                } else {
                    out_cols.push(c);
                    out_vals.push(v);
                }
            }
            out_ptr.push(out_cols.len());
        }

        Ok(Self {
            nrows,
            ncols,
            row_ptr: out_ptr,
            col_idx: out_cols,
            values: out_vals,
        })
    }

    /// Build from (row, col, value) triplets. Duplicate entries are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, S)]) -> Result<Self> {
        if let Some(&(r, _, _)) = triplets.iter().find(|t| t.0 >= nrows) {
            return Err(KpmError::InvalidOperator(format!(
                "row index {} out of range for {} rows",
                r, nrows
            )));
        }
        let mut counts = vec![0usize; nrows + 1];
        for &(r, _, _) in triplets {
            counts[r + 1] += 1;
        }
        for i in 0..nrows {
            counts[i + 1] += counts[i];
        }
        let mut next = counts.clone();
        let mut col_idx = vec![0usize; triplets.len()];
        let mut values = vec![S::zero(); triplets.len()];
        for &(r, c, v) in triplets {
            col_idx[next[r]] = c;
            values[next[r]] = v;
            next[r] += 1;
        }
        Self::from_csr(nrows, ncols, counts, col_idx, values)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[S] {
        &self.values
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[S]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Largest number of stored entries in any row.
    pub fn max_row_nnz(&self) -> usize {
        self.row_ptr.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
    }

    /// Entry (i, j), zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> S {
        let (cols, vals) = self.row(i);
        match cols.binary_search(&j) {
            Ok(k) => vals[k],
            Err(_) => S::zero(),
        }
    }

    /// Fails with `InvalidOperator` unless the matrix is square and
    /// `|A_ij - conj(A_ji)| <= tol * max|A|` for every stored entry.
    pub fn check_hermitian(&self, tol: f64) -> Result<()> {
        if self.nrows != self.ncols {
            return Err(KpmError::InvalidOperator(format!(
                "operator must be square, got {}x{}",
                self.nrows, self.ncols
            )));
        }
        let scale = self
            .values
            .iter()
            .map(|v| v.abs_sqr())
            .fold(0.0f64, f64::max)
            .sqrt()
            .max(f64::MIN_POSITIVE);
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                let mirror = self.get(j, i).conj();
                if (v - mirror).abs_sqr().sqrt() > tol * scale {
                    return Err(KpmError::InvalidOperator(format!(
                        "operator is not Hermitian: entry ({}, {}) does not match conjugate of ({}, {})",
                        i, j, j, i
                    )));
                }
            }
        }
        Ok(())
    }

    /// (A x)_i
    #[inline]
    pub fn row_product(&self, i: usize, x: &[S]) -> S {
        let mut sum = S::zero();
        for k in self.row_ptr[i]..self.row_ptr[i + 1] {
            sum += self.values[k] * x[self.col_idx[k]];
        }
        sum
    }

    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    pub fn spmv(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        let row_dot = |i: usize| self.row_product(i, x);
        #[cfg(feature = "rayon")]
        {
            if self.nrows >= PARALLEL_ROWS {
                use rayon::prelude::*;
                y.par_iter_mut().enumerate().for_each(|(i, yi)| *yi = row_dot(i));
                return;
            }
        }
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = row_dot(i);
        }
    }
}

impl<S: Scalar + ComplexField> CsrMatrix<S> {
    /// Convert into faer's owning CSR type.
    pub fn to_faer(&self) -> SparseRowMat<usize, S> {
        // Rows are already sorted and duplicate-free, as the checked constructor requires.
        let symbolic = SymbolicSparseRowMat::new_checked(
            self.nrows,
            self.ncols,
            self.row_ptr.clone(),
            None, // optional row_nnz: Option<Vec<usize>>
            self.col_idx.clone(),
        );
        SparseRowMat::new(symbolic, self.values.clone())
    }

    /// Dense copy of the matrix, for inspection and small reference computations.
    pub fn to_dense(&self) -> faer::Mat<S> {
        faer::Mat::from_fn(self.nrows, self.ncols, |i, j| self.get(i, j))
    }
}

impl<S: Scalar> LinearOperator<S> for CsrMatrix<S> {
    fn dim(&self) -> usize {
        self.nrows
    }

    fn apply_into(&self, x: &[S], y: &mut [S]) -> Result<()> {
        if self.nrows != self.ncols || x.len() != self.ncols || y.len() != self.nrows {
            return Err(KpmError::InvalidOperator(format!(
                "cannot apply {}x{} operator to vector of length {} into length {}",
                self.nrows,
                self.ncols,
                x.len(),
                y.len()
            )));
        }
        self.spmv(x, y);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn identity_spmv() {
        // 3×3 identity in CSR: row_ptr=[0,1,2,3], col_idx=[0,1,2], vals=[1,1,1]
        let m = CsrMatrix::from_csr(3, 3, vec![0, 1, 2, 3], vec![0, 1, 2], vec![1.0, 1.0, 1.0]).unwrap();
        let x = vec![2.0, 3.0, 5.0];
        let mut y = vec![0.0; 3];
        m.spmv(&x, &mut y);
        assert_eq!(y, x);
    }

    #[test]
    fn unsorted_rows_and_duplicates_are_normalized() {
        // row 0 holds (1, 2.0), (0, 1.0), (1, 0.5)
        let m = CsrMatrix::from_csr(2, 2, vec![0, 3, 4], vec![1, 0, 1, 0], vec![2.0, 1.0, 0.5, 2.5]).unwrap();
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(0).0, &[0, 1]);
        assert_eq!(m.get(0, 1), 2.5);
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn triplets_build_same_matrix() {
        let m = CsrMatrix::from_triplets(2, 2, &[(1, 0, 2.5), (0, 1, 2.5), (0, 0, 1.0)]).unwrap();
        let x = vec![1.0, 1.0];
        let mut y = vec![0.0; 2];
        m.spmv(&x, &mut y);
        assert_eq!(y, vec![3.5, 2.5]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            CsrMatrix::from_csr(2, 2, vec![0, 1], vec![0], vec![1.0]),
            Err(KpmError::InvalidOperator(_))
        ));
        assert!(matches!(
            CsrMatrix::from_csr(1, 1, vec![0, 1], vec![3], vec![1.0]),
            Err(KpmError::InvalidOperator(_))
        ));
    }

    #[test]
    fn hermiticity_check() {
        let i = Complex64::new(0.0, 1.0);
        let h = CsrMatrix::from_triplets(2, 2, &[(0, 1, i), (1, 0, -i)]).unwrap();
        assert!(h.check_hermitian(1e-12).is_ok());
        let not_h = CsrMatrix::from_triplets(2, 2, &[(0, 1, i), (1, 0, i)]).unwrap();
        assert!(matches!(not_h.check_hermitian(1e-12), Err(KpmError::InvalidOperator(_))));
        let rect = CsrMatrix::from_triplets(2, 3, &[(0, 2, 1.0)]).unwrap();
        assert!(matches!(rect.check_hermitian(1e-12), Err(KpmError::InvalidOperator(_))));
    }

    #[test]
    fn apply_rejects_dimension_mismatch() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0)]).unwrap();
        let mut y = vec![0.0; 2];
        assert!(m.apply_into(&[1.0, 2.0, 3.0], &mut y).is_err());
    }

    #[test]
    fn dense_export_matches_entries() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 1, -1.0), (1, 0, -1.0), (1, 1, 0.5)]).unwrap();
        let d = m.to_dense();
        assert_eq!(d[(0, 1)], -1.0);
        assert_eq!(d[(1, 1)], 0.5);
        assert_eq!(d[(0, 0)], 0.0);
        let f = m.to_faer();
        assert_eq!(f.nrows(), 2);
        assert_eq!(f.to_dense()[(1, 0)], -1.0);
    }
}
