//! Rescaled operator in the layout selected by the optimization level.
//!
//! The adapter owns `H' = (H - b) / a` and hides its storage:
//!
//! | level | ordering              | storage |
//! |-------|-----------------------|---------|
//! | 0     | original              | CSR     |
//! | 1, 2  | breadth-first by seed | CSR     |
//! | 3     | breadth-first by seed | ELLPACK |
//!
//! With a breadth-first ordering, a recursion started at the seed index only touches the leading
//! rows of each vector, and [`OperatorAdapter::reach`] says how many.

use crate::config::OptimizationLevel;
use crate::core::traits::{LinearOperator, Scalar};
use crate::error::{KpmError, Result};
use crate::matrix::{CsrMatrix, EllMatrix};
#[cfg(feature = "rayon")]
use crate::matrix::sparse::PARALLEL_ROWS;
use crate::solver::Scaling;
use crate::utils::ordering::{BfsOrdering, Permutation, bfs_ordering, extract_adjacency};

#[derive(Debug, Clone)]
enum Layout<S> {
    Csr(CsrMatrix<S>),
    Ell(EllMatrix<S>),
}

/// Rescaled Hermitian operator prepared for the Chebyshev recursion.
#[derive(Debug, Clone)]
pub struct OperatorAdapter<S> {
    level: OptimizationLevel,
    scaling: Scaling,
    seed: usize,
    layout: Layout<S>,
    permutation: Permutation,
    ordering: Option<BfsOrdering>,
}

impl<S: Scalar> OperatorAdapter<S> {
    /// Rescale `op` and lay it out for `level`. The seed is the index the recursion starts
    /// from; it decides the row ordering at levels 1 and above.
    pub fn build(op: &CsrMatrix<S>, scaling: Scaling, level: OptimizationLevel, seed: usize) -> Result<Self> {
        let n = op.nrows();
        if n != op.ncols() {
            return Err(KpmError::InvalidOperator(format!(
                "operator must be square, got {}x{}",
                n,
                op.ncols()
            )));
        }
        if seed >= n {
            return Err(KpmError::InvalidIndex { index: seed, dim: n });
        }
        if !(scaling.a.is_finite() && scaling.a > 0.0 && scaling.b.is_finite()) {
            return Err(KpmError::InvalidConfig(format!(
                "invalid rescaling a = {}, b = {}",
                scaling.a, scaling.b
            )));
        }

        let (permutation, ordering) = if level.reorders() {
            let bfs = bfs_ordering(&extract_adjacency(op), seed);
            (bfs.permutation.clone(), Some(bfs))
        } else {
            (Permutation::identity(n), None)
        };

        let inv_a = 1.0 / scaling.a;
        let shift = S::from_real(-scaling.b * inv_a);
        let mut triplets = Vec::with_capacity(op.nnz() + n);
        for i in 0..n {
            let row = permutation.to_internal(i);
            let (cols, vals) = op.row(i);
            let mut has_diagonal = false;
            for (&j, &v) in cols.iter().zip(vals) {
                let mut value = v.scale(inv_a);
                if j == i {
                    value += shift;
                    has_diagonal = true;
                }
                triplets.push((row, permutation.to_internal(j), value));
            }
            if !has_diagonal && scaling.b != 0.0 {
                triplets.push((row, row, shift));
            }
        }
        let csr = CsrMatrix::from_triplets(n, n, &triplets)?;
        let layout = if level.uses_ellpack() {
            Layout::Ell(EllMatrix::from_csr(&csr))
        } else {
            Layout::Csr(csr)
        };

        log::debug!(
            "operator adapter: n = {}, level {}, seed {}, {} shells",
            n,
            level,
            seed,
            ordering.as_ref().map_or(0, |o| o.shells.len())
        );
        Ok(Self {
            level,
            scaling,
            seed,
            layout,
            permutation,
            ordering,
        })
    }

    pub fn dim(&self) -> usize {
        self.permutation.len()
    }

    pub fn level(&self) -> OptimizationLevel {
        self.level
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    /// Original index the ordering was built from.
    pub fn seed(&self) -> usize {
        self.seed
    }

    /// Mapping between original and internal row numbering (identity at level 0).
    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    /// Rows that may be nonzero after `step` applications to a vector supported on the seed.
    pub fn reach(&self, step: usize) -> usize {
        match &self.ordering {
            Some(o) => o.reach(step),
            None => self.dim(),
        }
    }

    /// Like [`OperatorAdapter::reach`] for a recursion started at `start`; only a start at the
    /// seed can be truncated.
    pub fn reach_from(&self, start: usize, step: usize) -> usize {
        if start == self.seed { self.reach(step) } else { self.dim() }
    }

    /// Rescaled matrix in internal ordering, when stored as CSR.
    pub fn csr(&self) -> Option<&CsrMatrix<S>> {
        match &self.layout {
            Layout::Csr(m) => Some(m),
            Layout::Ell(_) => None,
        }
    }

    /// `H' x` in internal ordering.
    pub fn apply(&self, x: &[S]) -> Result<Vec<S>> {
        let mut y = vec![S::zero(); self.dim()];
        self.apply_into(x, &mut y)?;
        Ok(y)
    }

    /// `H' x` with `x` and the result in original ordering.
    pub fn apply_original(&self, x: &[S]) -> Result<Vec<S>> {
        if x.len() != self.dim() {
            return Err(self.length_error(x.len()));
        }
        let y = self.apply(&self.permutation.permute(x))?;
        Ok(self.permutation.unpermute(&y))
    }

    /// `y[k] = (H' x)[k]` for `k < rows`; the remaining entries of `y` are left untouched.
    pub(crate) fn apply_rows(&self, x: &[S], y: &mut [S], rows: usize) {
        match &self.layout {
            Layout::Csr(m) => apply_prefix(|k, v| m.row_product(k, v), x, y, rows),
            Layout::Ell(m) => apply_prefix(|k, v| m.row_product(k, v), x, y, rows),
        }
    }

    /// One recursion step in place: `prev[k] ← 2 (H' cur)[k] - prev[k]` for `k < rows`.
    pub(crate) fn chebyshev_step(&self, cur: &[S], prev: &mut [S], rows: usize) {
        match &self.layout {
            Layout::Csr(m) => step_prefix(|k, v| m.row_product(k, v), cur, prev, rows),
            Layout::Ell(m) => step_prefix(|k, v| m.row_product(k, v), cur, prev, rows),
        }
    }

    /// Recursion step that also accumulates `(<cur|cur>, <new|cur>)` over the updated rows.
    pub(crate) fn chebyshev_step_fused(&self, cur: &[S], prev: &mut [S], rows: usize) -> (S, S) {
        match &self.layout {
            Layout::Csr(m) => step_prefix_fused(|k, v| m.row_product(k, v), cur, prev, rows),
            Layout::Ell(m) => step_prefix_fused(|k, v| m.row_product(k, v), cur, prev, rows),
        }
    }

    fn length_error(&self, len: usize) -> KpmError {
        KpmError::InvalidOperator(format!(
            "vector of length {} does not match operator dimension {}",
            len,
            self.dim()
        ))
    }
}

impl<S: Scalar> LinearOperator<S> for OperatorAdapter<S> {
    fn dim(&self) -> usize {
        self.permutation.len()
    }

    fn apply_into(&self, x: &[S], y: &mut [S]) -> Result<()> {
        if x.len() != self.dim() {
            return Err(self.length_error(x.len()));
        }
        if y.len() != self.dim() {
            return Err(self.length_error(y.len()));
        }
        self.apply_rows(x, y, self.dim());
        Ok(())
    }
}

fn apply_prefix<S, R>(row: R, x: &[S], y: &mut [S], rows: usize)
where
    S: Scalar,
    R: Fn(usize, &[S]) -> S + Sync,
{
    let y = &mut y[..rows];
    #[cfg(feature = "rayon")]
    {
        if rows >= PARALLEL_ROWS {
            use rayon::prelude::*;
            y.par_iter_mut().enumerate().for_each(|(k, yk)| *yk = row(k, x));
            return;
        }
    }
    for (k, yk) in y.iter_mut().enumerate() {
        *yk = row(k, x);
    }
}

fn step_prefix<S, R>(row: R, cur: &[S], prev: &mut [S], rows: usize)
where
    S: Scalar,
    R: Fn(usize, &[S]) -> S + Sync,
{
    let prev = &mut prev[..rows];
    #[cfg(feature = "rayon")]
    {
        if rows >= PARALLEL_ROWS {
            use rayon::prelude::*;
            prev.par_iter_mut().enumerate().for_each(|(k, pk)| {
                let hk = row(k, cur);
                *pk = hk + hk - *pk;
            });
            return;
        }
    }
    for (k, pk) in prev.iter_mut().enumerate() {
        let hk = row(k, cur);
        *pk = hk + hk - *pk;
    }
}

fn step_prefix_fused<S, R>(row: R, cur: &[S], prev: &mut [S], rows: usize) -> (S, S)
where
    S: Scalar,
    R: Fn(usize, &[S]) -> S + Sync,
{
    let prev = &mut prev[..rows];
    #[cfg(feature = "rayon")]
    {
        if rows >= PARALLEL_ROWS {
            use rayon::prelude::*;
            return prev
                .par_iter_mut()
                .enumerate()
                .map(|(k, pk)| {
                    let hk = row(k, cur);
                    *pk = hk + hk - *pk;
                    let ck = cur[k];
                    (ck.conj() * ck, pk.conj() * ck)
                })
                .reduce(|| (S::zero(), S::zero()), |a, b| (a.0 + b.0, a.1 + b.1));
        }
    }
    let mut norm = S::zero();
    let mut overlap = S::zero();
    for (k, pk) in prev.iter_mut().enumerate() {
        let hk = row(k, cur);
        *pk = hk + hk - *pk;
        let ck = cur[k];
        norm += ck.conj() * ck;
        overlap += pk.conj() * ck;
    }
    (norm, overlap)
}
