//! Damping kernels for the Chebyshev series.
//!
//! A truncated Chebyshev series of a spectral function rings (Gibbs oscillations). Multiplying
//! moment `n` by a kernel coefficient `g_n` turns the truncation into a smooth, positive
//! broadening. The coefficients depend only on the number of moments, never on the operator.

pub mod reconstruct;

pub use reconstruct::{KernelReconstructor, moments_diverged};

use crate::error::{KpmError, Result};
use std::f64::consts::PI;

/// Choice of damping kernel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum KernelKind {
    /// Jackson kernel: near-Gaussian broadening of width about `π/M` in the scaled variable.
    #[default]
    Jackson,
    /// Lorentz kernel `sinh(λ(1 - n/M)) / sinh(λ)`: mimics a Lorentzian broadening of width
    /// `λ/M`, the natural choice for Green's functions.
    Lorentz { lambda: f64 },
}

impl KernelKind {
    pub fn validate(&self) -> Result<()> {
        match *self {
            KernelKind::Jackson => Ok(()),
            KernelKind::Lorentz { lambda } if lambda.is_finite() && lambda > 0.0 => Ok(()),
            KernelKind::Lorentz { lambda } => Err(KpmError::InvalidConfig(format!(
                "Lorentz kernel lambda must be positive, got {}",
                lambda
            ))),
        }
    }

    /// Damping coefficients `g_0 .. g_{M-1}`.
    pub fn coefficients(&self, num_moments: usize) -> Vec<f64> {
        match *self {
            KernelKind::Jackson => jackson(num_moments),
            KernelKind::Lorentz { lambda } => lorentz(num_moments, lambda),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KernelKind::Jackson => "Jackson",
            KernelKind::Lorentz { .. } => "Lorentz",
        }
    }
}

fn jackson(num_moments: usize) -> Vec<f64> {
    let n1 = (num_moments + 1) as f64;
    let phase = PI / n1;
    let cot = phase.cos() / phase.sin();
    (0..num_moments)
        .map(|n| {
            let n = n as f64;
            ((n1 - n) * (phase * n).cos() + (phase * n).sin() * cot) / n1
        })
        .collect()
}

fn lorentz(num_moments: usize, lambda: f64) -> Vec<f64> {
    let m = num_moments as f64;
    let norm = lambda.sinh();
    (0..num_moments)
        .map(|n| (lambda * (1.0 - n as f64 / m)).sinh() / norm)
        .collect()
}

/// Moments needed to resolve `broadening` for an operator rescaled by `a`:
/// `max(2, ceil(lambda * a / broadening))`.
pub fn required_moments(lambda: f64, a: f64, broadening: f64) -> Result<usize> {
    if !(broadening.is_finite() && broadening > 0.0) {
        return Err(KpmError::InvalidConfig(format!(
            "broadening must be positive, got {}",
            broadening
        )));
    }
    let m = (lambda * a / broadening).ceil();
    if !m.is_finite() || m > u32::MAX as f64 {
        return Err(KpmError::InvalidConfig(format!(
            "broadening {} needs an unrepresentable number of moments",
            broadening
        )));
    }
    Ok((m as usize).max(2))
}
