//! Green's function and LDOS reconstruction from Chebyshev moments.
//!
//! With damped moments `g_n μ_n`, the retarded Green's function at energy `E` is
//!
//! ```text
//! G(E) = -i / (a sqrt(1 - x²)) · [ g_0 μ_0 + 2 Σ_{n≥1} g_n μ_n exp(-i n arccos x) ],   x = (E - b) / a
//! ```
//!
//! which is the boundary value of the resolvent at `E + i0⁺`; the kernel supplies the finite
//! broadening. The local density of states is `-Im G_ii(E) / π` and integrates to `μ_0 = 1`.
//!
//! # References
//! - Weiße, Wellein, Alvermann, Fehske (2006). The kernel polynomial method. Rev. Mod. Phys. 78, 275.

use crate::kernel::KernelKind;
use crate::solver::Scaling;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Energies beyond this count are evaluated in parallel with `rayon`.
#[cfg(feature = "rayon")]
const PARALLEL_ENERGIES: usize = 64;

/// Slack on `|μ_n| <= 1` for rounding accumulated over the recursion.
pub const MOMENT_BOUND_TOL: f64 = 1e-8;

/// Whether a moment series cannot come from an operator rescaled into `[-1, 1]`.
///
/// `|<i|T_n(H')|j>| <= ||T_n(H')|| <= 1` whenever the spectrum of `H'` lies in `[-1, 1]`, so a
/// larger (or non-finite) moment means the energy bounds were underestimated.
pub fn moments_diverged(moments: &[Complex64]) -> bool {
    moments.iter().any(|m| !(m.norm() <= 1.0 + MOMENT_BOUND_TOL))
}

/// Applies kernel damping to moments and evaluates the series at arbitrary energies.
#[derive(Debug, Clone)]
pub struct KernelReconstructor {
    scaling: Scaling,
    kernel: KernelKind,
}

impl KernelReconstructor {
    pub fn new(scaling: Scaling, kernel: KernelKind) -> Self {
        Self { scaling, kernel }
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    /// `g_n μ_n` with the endpoint weighting folded in: `g_0 μ_0` and `2 g_n μ_n` for n ≥ 1.
    pub fn damp(&self, moments: &[Complex64]) -> Vec<Complex64> {
        let g = self.kernel.coefficients(moments.len());
        moments
            .iter()
            .zip(&g)
            .enumerate()
            .map(|(n, (&mu, &gn))| if n == 0 { mu * gn } else { mu * (2.0 * gn) })
            .collect()
    }

    /// Green's function at each energy.
    pub fn green(&self, moments: &[Complex64], energies: &[f64]) -> Vec<Complex64> {
        let damped = self.damp(moments);
        let valid = !moments_diverged(moments);
        let eval = |&energy: &f64| self.green_at(&damped, valid, energy);
        #[cfg(feature = "rayon")]
        {
            if energies.len() >= PARALLEL_ENERGIES {
                use rayon::prelude::*;
                return energies.par_iter().map(eval).collect();
            }
        }
        energies.iter().map(eval).collect()
    }

    /// Local density of states `-Im G / π` from diagonal moments.
    pub fn ldos(&self, moments: &[Complex64], energies: &[f64]) -> Vec<f64> {
        self.green(moments, energies)
            .into_iter()
            .map(|g| -g.im / PI)
            .collect()
    }

    fn green_at(&self, damped: &[Complex64], valid: bool, energy: f64) -> Complex64 {
        let x = self.scaling.scale_energy(energy);
        if !valid || !x.is_finite() {
            return Complex64::new(f64::NAN, f64::NAN);
        }
        if x.abs() >= 1.0 {
            // No spectral weight outside the expansion domain.
            return Complex64::new(0.0, 0.0);
        }
        let theta = x.acos();
        let step = Complex64::new(theta.cos(), -theta.sin());
        let mut phase = Complex64::new(1.0, 0.0);
        let mut sum = Complex64::new(0.0, 0.0);
        for &m in damped {
            sum += m * phase;
            phase *= step;
        }
        let weight = 1.0 / (self.scaling.a * (1.0 - x * x).sqrt());
        Complex64::new(0.0, -weight) * sum
    }
}
