//! Chebyshev moment recursion.
//!
//! Moments `μ_n = <i| T_n(H') |j>` come from the three-term recursion
//! `r_{n+1} = 2 H' r_n - r_{n-1}` started at `r_0 = e_j`, `r_1 = H' e_j`, reading `μ_n = r_n[i]`.
//! The recursion runs in place on two buffers: each step overwrites `r_{n-1}` with `r_{n+1}`
//! and swaps.
//!
//! For diagonal elements, levels 2 and 3 interleave: from `T_{2n} = 2 T_n² - T_0` and
//! `T_{2n+1} = 2 T_{n+1} T_n - T_1` follow
//!
//! ```text
//! μ_{2n}   = 2 <r_n|r_n>     - μ_0
//! μ_{2n+1} = 2 <r_{n+1}|r_n> - μ_1
//! ```
//!
//! so every step yields two moments, with both inner products taken in the same pass.

use crate::core::traits::Scalar;
use crate::error::{KpmError, Result};
use crate::matrix::OperatorAdapter;
use num_complex::Complex64;

/// Moments of one matrix element.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentSeries {
    pub values: Vec<Complex64>,
    /// Sparse applies (recursion steps) spent.
    pub applies: usize,
}

/// The two working vectors of the recursion, reused across requests of the same dimension.
#[derive(Debug, Clone)]
pub struct RecursionBuffers<S> {
    cur: Vec<S>,
    prev: Vec<S>,
}

impl<S: Scalar> RecursionBuffers<S> {
    pub fn new(n: usize) -> Self {
        Self {
            cur: vec![S::zero(); n],
            prev: vec![S::zero(); n],
        }
    }

    /// Zero both vectors, resizing to `n`.
    fn reset(&mut self, n: usize) {
        for v in [&mut self.cur, &mut self.prev] {
            v.clear();
            v.resize(n, S::zero());
        }
    }
}

/// Moment recursion over a prepared adapter.
pub struct MomentRecursion<'a, S> {
    adapter: &'a OperatorAdapter<S>,
}

impl<'a, S: Scalar> MomentRecursion<'a, S> {
    pub fn new(adapter: &'a OperatorAdapter<S>) -> Self {
        Self { adapter }
    }

    /// `μ_n = <row| T_n(H') |col>` for `n < num_moments`, indices in original numbering.
    ///
    /// Diagonal requests (`row == col`) interleave when the adapter's level allows it. Rows are
    /// truncated only when `col` is the adapter's seed.
    pub fn compute(
        &self,
        row: usize,
        col: usize,
        num_moments: usize,
        buffers: &mut RecursionBuffers<S>,
    ) -> Result<MomentSeries> {
        let n = self.adapter.dim();
        for index in [row, col] {
            if index >= n {
                return Err(KpmError::InvalidIndex { index, dim: n });
            }
        }
        if num_moments < 2 {
            return Err(KpmError::InvalidConfig(format!(
                "at least 2 moments are needed, got {}",
                num_moments
            )));
        }
        if row == col && self.adapter.level().interleaves() {
            Ok(self.diagonal_interleaved(col, num_moments, buffers))
        } else {
            Ok(self.plain(row, col, num_moments, buffers))
        }
    }

    /// Sets `prev = r_0 = e_col` and `cur = r_1`, returns the internal index of `col`.
    fn start(&self, col: usize, buffers: &mut RecursionBuffers<S>) -> usize {
        let adapter = self.adapter;
        buffers.reset(adapter.dim());
        let start = adapter.permutation().to_internal(col);
        buffers.prev[start] = S::one();
        adapter.apply_rows(&buffers.prev, &mut buffers.cur, adapter.reach_from(col, 1));
        start
    }

    fn plain(&self, row: usize, col: usize, num_moments: usize, buffers: &mut RecursionBuffers<S>) -> MomentSeries {
        let adapter = self.adapter;
        self.start(col, buffers);
        let target = adapter.permutation().to_internal(row);

        let mut values = Vec::with_capacity(num_moments);
        values.push(buffers.prev[target].to_complex());
        values.push(buffers.cur[target].to_complex());
        for step in 1..num_moments - 1 {
            let RecursionBuffers { cur, prev } = &mut *buffers;
            adapter.chebyshev_step(cur, prev, adapter.reach_from(col, step + 1));
            std::mem::swap(cur, prev);
            values.push(cur[target].to_complex());
        }
        MomentSeries {
            values,
            applies: num_moments - 1,
        }
    }

    fn diagonal_interleaved(&self, col: usize, num_moments: usize, buffers: &mut RecursionBuffers<S>) -> MomentSeries {
        let adapter = self.adapter;
        let start = self.start(col, buffers);

        let mu0 = S::one();
        let mu1 = buffers.cur[start];
        let mut values = vec![Complex64::new(0.0, 0.0); num_moments];
        values[0] = mu0.to_complex();
        values[1] = mu1.to_complex();
        let mut applies = 1;
        let mut step = 1;
        while 2 * step < num_moments {
            let RecursionBuffers { cur, prev } = &mut *buffers;
            let (norm, overlap) = adapter.chebyshev_step_fused(cur, prev, adapter.reach_from(col, step + 1));
            applies += 1;
            values[2 * step] = (norm + norm - mu0).to_complex();
            if 2 * step + 1 < num_moments {
                values[2 * step + 1] = (overlap + overlap - mu1).to_complex();
            }
            std::mem::swap(cur, prev);
            step += 1;
        }
        MomentSeries { values, applies }
    }
}
