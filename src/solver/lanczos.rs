//! Lanczos estimate of the extreme eigenvalues of a Hermitian operator.
//!
//! The operator is tridiagonalized from a seeded random start vector without
//! reorthogonalization; extreme eigenvalues converge first and ghost copies do not move them.
//! Every [`CHECK_INTERVAL`] iterations the extreme eigenvalues of the tridiagonal matrix are
//! found by Sturm bisection and compared with the previous check. The iteration stops when both
//! moved by less than `precision · width / 10`, on breakdown (an invariant subspace was found), or
//! at the iteration cap. Extreme Ritz values converge like `1/k²`, so the distance left to the
//! spectrum edge is then below `precision · width`. Ritz values approach the spectrum from
//! inside, so the returned bounds are widened by `precision · width` on each side.
//!
//! # References
//! - Lanczos (1950), J. Res. Nat. Bur. Standards 45, 255
//! - Saad, Y. (2011). Numerical Methods for Large Eigenvalue Problems, §6.

use crate::core::traits::{LinearOperator, Scalar};
use crate::core::wrappers::{dot, norm};
use crate::error::{KpmError, Result};
use crate::solver::scaling::SpectralBounds;
use crate::utils::convergence::{BoundsStats, Convergence};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Iterations between two convergence checks.
pub const CHECK_INTERVAL: usize = 5;
/// β below this (relative to the first α scale) means the Krylov space is invariant.
const BREAKDOWN: f64 = 1e-12;
/// Ratio between the per-check change tolerance and the requested precision.
const CHANGE_FRACTION: f64 = 0.1;
/// Smallest magnitude a Sturm pivot may take.
const PIVOT_GUARD: f64 = 1e-300;

/// Result of a Lanczos bounds estimate.
#[derive(Debug, Clone)]
pub struct LanczosEstimate {
    /// Widened bounds, safe for rescaling.
    pub bounds: SpectralBounds,
    /// Raw extreme Ritz values.
    pub ritz: SpectralBounds,
    pub stats: BoundsStats,
}

/// Lanczos-based spectral bounds estimator.
#[derive(Debug, Clone)]
pub struct SpectralBoundsEstimator {
    pub conv: Convergence,
    pub seed: u64,
}

impl SpectralBoundsEstimator {
    pub fn new(precision: f64, max_iters: usize) -> Self {
        Self {
            conv: Convergence { tol: precision, max_iters },
            seed: 0x5eed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Estimate `(E_min, E_max)` of `op`. Only operator failures are errors; the iteration
    /// itself always returns its best estimate.
    pub fn estimate<S, A>(&self, op: &A) -> Result<LanczosEstimate>
    where
        S: Scalar,
        A: LinearOperator<S>,
    {
        let n = op.dim();
        if n == 0 {
            return Err(KpmError::InvalidOperator("operator has dimension 0".to_string()));
        }
        let cap = self.conv.max_iters.min(n).max(1);
        let conv = Convergence {
            tol: self.conv.tol * CHANGE_FRACTION,
            max_iters: cap,
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut v: Vec<S> = (0..n)
            .map(|_| S::from_parts(rng.r#gen::<f64>() - 0.5, rng.r#gen::<f64>() - 0.5))
            .collect();
        let v_norm = norm(&v);
        for vi in v.iter_mut() {
            *vi = vi.scale(1.0 / v_norm);
        }
        let mut v_prev = vec![S::zero(); n];
        let mut w = vec![S::zero(); n];

        let mut alpha: Vec<f64> = Vec::with_capacity(cap);
        let mut beta: Vec<f64> = Vec::with_capacity(cap);
        let mut previous: Option<(f64, f64)> = None;
        let mut stats: Option<BoundsStats> = None;

        for j in 0..cap {
            // w = A v_j - β_j v_{j-1}
            op.apply_into(&v, &mut w)?;
            if let Some(&b_prev) = beta.last() {
                for (wi, &pi) in w.iter_mut().zip(&v_prev) {
                    *wi = *wi - pi.scale(b_prev);
                }
            }
            // α_j = <v_j|w>, real for Hermitian A
            let a_j = dot(&v, &w).real();
            alpha.push(a_j);
            for (wi, &vi) in w.iter_mut().zip(&v) {
                *wi = *wi - vi.scale(a_j);
            }
            let b_next = norm(&w);
            let scale = alpha.iter().fold(b_next, |m, a| m.max(a.abs())).max(1.0);
            let breakdown = b_next <= BREAKDOWN * scale;

            let iterations = j + 1;
            if iterations % CHECK_INTERVAL == 0 || breakdown || iterations == cap {
                let current = extreme_eigenvalues(&alpha, &beta);
                if breakdown {
                    // The tridiagonal matrix holds exact eigenvalues of A.
                    stats = Some(BoundsStats {
                        iterations,
                        min: current.0,
                        max: current.1,
                        converged: true,
                    });
                    break;
                }
                if let Some(prev) = previous {
                    let (stop, s) = conv.check(prev, current, iterations);
                    if stop {
                        stats = Some(s);
                        break;
                    }
                }
                previous = Some(current);
                if iterations == cap {
                    stats = Some(BoundsStats {
                        iterations,
                        min: current.0,
                        max: current.1,
                        converged: false,
                    });
                    break;
                }
            }

            // v_{j+1} = w / β_{j+1}
            beta.push(b_next);
            std::mem::swap(&mut v_prev, &mut v);
            for (vi, &wi) in v.iter_mut().zip(&w) {
                *vi = wi.scale(1.0 / b_next);
            }
        }

        let stats = match stats {
            Some(s) => s,
            None => {
                let (min, max) = {
                    let off = beta.len().min(alpha.len().saturating_sub(1));
                    extreme_eigenvalues(&alpha, &beta[..off])
                };
                BoundsStats {
                    iterations: alpha.len(),
                    min,
                    max,
                    converged: false,
                }
            }
        };
        let ritz = SpectralBounds::new(stats.min, stats.max);
        let pad = self.conv.tol * ritz.width();
        let bounds = SpectralBounds::new(stats.min - pad, stats.max + pad);
        log::debug!(
            "lanczos bounds ({:.6}, {:.6}) after {} iterations (converged: {})",
            bounds.min,
            bounds.max,
            stats.iterations,
            stats.converged
        );
        Ok(LanczosEstimate { bounds, ritz, stats })
    }
}

/// Count eigenvalues of a symmetric tridiagonal matrix strictly less than λ.
///
/// Uses the LDLT factorization (Sturm sequence): the number of negative
/// pivots equals the number of eigenvalues below λ.
///
/// - `diagonal`: main diagonal d[0..n]
/// - `off_diag`: sub/super-diagonal e[0..n-1]
pub fn sturm_count(diagonal: &[f64], off_diag: &[f64], lambda: f64) -> usize {
    let n = diagonal.len();
    if n == 0 {
        return 0;
    }
    let mut count = 0;
    let mut q = diagonal[0] - lambda;
    if q < 0.0 {
        count += 1;
    }
    for i in 1..n {
        let q_safe = if q.abs() < PIVOT_GUARD {
            if q >= 0.0 { PIVOT_GUARD } else { -PIVOT_GUARD }
        } else {
            q
        };
        q = (diagonal[i] - lambda) - off_diag[i - 1] * off_diag[i - 1] / q_safe;
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// The `k`-th smallest eigenvalue (0-based) of a symmetric tridiagonal matrix, by bisection.
pub fn kth_eigenvalue(diagonal: &[f64], off_diag: &[f64], k: usize) -> f64 {
    let n = diagonal.len();
    // Gershgorin bounds
    let mut lo = f64::MAX;
    let mut hi = f64::MIN;
    for i in 0..n {
        let e_left = if i > 0 { off_diag[i - 1].abs() } else { 0.0 };
        let e_right = if i + 1 < n { off_diag[i].abs() } else { 0.0 };
        lo = lo.min(diagonal[i] - e_left - e_right);
        hi = hi.max(diagonal[i] + e_left + e_right);
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if (hi - lo) < 2.0 * f64::EPSILON * mid.abs().max(1.0) {
            break;
        }
        if sturm_count(diagonal, off_diag, mid) > k {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    0.5 * (lo + hi)
}

/// (smallest, largest) eigenvalue of the tridiagonal matrix.
fn extreme_eigenvalues(diagonal: &[f64], off_diag: &[f64]) -> (f64, f64) {
    match diagonal.len() {
        0 => (0.0, 0.0),
        1 => (diagonal[0], diagonal[0]),
        n => (
            kth_eigenvalue(diagonal, off_diag, 0),
            kth_eigenvalue(diagonal, off_diag, n - 1),
        ),
    }
}
