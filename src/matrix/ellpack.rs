//! Fixed-stride (ELLPACK) sparse storage.
//!
//! Every row holds exactly `width` slots; short rows are padded with zero values pointing at
//! their own diagonal, so the inner product loop has a constant trip count.

use crate::core::traits::Scalar;
use crate::matrix::CsrMatrix;

#[derive(Debug, Clone)]
pub struct EllMatrix<S> {
    nrows: usize,
    width: usize,
    /// Row-major, `nrows * width` entries.
    col_idx: Vec<usize>,
    values: Vec<S>,
}

impl<S: Scalar> EllMatrix<S> {
    pub fn from_csr(m: &CsrMatrix<S>) -> Self {
        let nrows = m.nrows();
        let width = m.max_row_nnz();
        let mut col_idx = Vec::with_capacity(nrows * width);
        let mut values = Vec::with_capacity(nrows * width);
        for i in 0..nrows {
            let (cols, vals) = m.row(i);
            col_idx.extend_from_slice(cols);
            values.extend_from_slice(vals);
            for _ in cols.len()..width {
                col_idx.push(i);
                values.push(S::zero());
            }
        }
        Self {
            nrows,
            width,
            col_idx,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Slots per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Stored entries that are not padding.
    pub fn nnz(&self) -> usize {
        self.col_idx
            .chunks(self.width.max(1))
            .zip(self.values.chunks(self.width.max(1)))
            .enumerate()
            .map(|(i, (cols, vals))| {
                cols.iter()
                    .zip(vals)
                    .filter(|&(&c, &v)| !(c == i && v == S::zero()))
                    .count()
            })
            .sum()
    }

    /// (A x)_i
    #[inline]
    pub fn row_product(&self, i: usize, x: &[S]) -> S {
        let start = i * self.width;
        let cols = &self.col_idx[start..start + self.width];
        let vals = &self.values[start..start + self.width];
        let mut sum = S::zero();
        for (&c, &v) in cols.iter().zip(vals) {
            sum += v * x[c];
        }
        sum
    }

    /// Compute y = A * x.
    pub fn spmv(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.nrows);
        assert_eq!(y.len(), self.nrows);
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row_product(i, x);
        }
    }
}
