//! Engine options.
//!
//! This module provides the `KpmConfig` struct, which collects every tunable of a KPM engine:
//! the accuracy factor `lambda`, optional user-supplied energy bounds, the optimization level,
//! the Lanczos precision used when bounds are estimated, and the damping kernel.

use crate::error::{KpmError, Result};
use crate::kernel::KernelKind;
use std::fmt;

/// Storage and recursion strategy. A performance hint only: every level produces the same
/// moments up to floating-point rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum OptimizationLevel {
    /// Plain CSR, no reordering.
    Level0,
    /// Rows reordered by distance from the start index; the apply skips rows the recursion
    /// cannot have reached yet.
    Level1,
    /// Level 1 plus interleaving: two moments per sparse-apply pass.
    Level2,
    /// Level 2 on a fixed-stride (ELLPACK) layout.
    #[default]
    Level3,
}

impl OptimizationLevel {
    pub const ALL: [OptimizationLevel; 4] = [
        OptimizationLevel::Level0,
        OptimizationLevel::Level1,
        OptimizationLevel::Level2,
        OptimizationLevel::Level3,
    ];

    /// Map a numeric level, clamping anything above 3 to the nearest supported level.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => OptimizationLevel::Level0,
            1 => OptimizationLevel::Level1,
            2 => OptimizationLevel::Level2,
            _ => OptimizationLevel::Level3,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn reorders(self) -> bool {
        self >= OptimizationLevel::Level1
    }

    pub fn interleaves(self) -> bool {
        self >= OptimizationLevel::Level2
    }

    pub fn uses_ellpack(self) -> bool {
        self == OptimizationLevel::Level3
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// KPM engine parameters.
#[derive(Debug, Clone)]
pub struct KpmConfig {
    /// Accuracy factor, usually 3–5. The number of moments is `lambda * a / broadening`.
    pub lambda: f64,
    /// `(min, max)` eigenvalue bounds. May be overestimated (slower) but never
    /// underestimated (non-finite results). `None` estimates them with Lanczos.
    pub energy_bounds: Option<(f64, f64)>,
    pub optimization_level: OptimizationLevel,
    /// Precision of the Lanczos bounds estimate, relative to the spectral width.
    pub bounds_precision: f64,
    pub kernel: KernelKind,
    /// Margin ε keeping the rescaled spectrum inside `[-1 + ε/2, 1 - ε/2]`.
    pub scale_margin: f64,
    pub lanczos_max_iterations: usize,
    /// Seed of the Lanczos start vector.
    pub lanczos_seed: u64,
}

impl Default for KpmConfig {
    fn default() -> Self {
        Self {
            lambda: 4.0,
            energy_bounds: None,
            optimization_level: OptimizationLevel::Level3,
            bounds_precision: 0.002,
            kernel: KernelKind::Jackson,
            scale_margin: 0.01,
            lanczos_max_iterations: 1000,
            lanczos_seed: 0x5eed,
        }
    }
}

impl KpmConfig {
    /// Defaults for the accelerator backend (level 1).
    pub fn gpu_default() -> Self {
        Self {
            optimization_level: OptimizationLevel::Level1,
            ..Self::default()
        }
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_energy_bounds(mut self, min: f64, max: f64) -> Self {
        self.energy_bounds = Some((min, max));
        self
    }

    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_bounds_precision(mut self, precision: f64) -> Self {
        self.bounds_precision = precision;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelKind) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_lanczos_seed(mut self, seed: u64) -> Self {
        self.lanczos_seed = seed;
        self
    }

    /// Reject values that cannot produce a meaningful expansion.
    pub fn validate(&self) -> Result<()> {
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(KpmError::InvalidConfig(format!("lambda must be positive, got {}", self.lambda)));
        }
        if !(self.bounds_precision.is_finite() && self.bounds_precision > 0.0) {
            return Err(KpmError::InvalidConfig(format!(
                "bounds precision must be positive, got {}",
                self.bounds_precision
            )));
        }
        if !(self.scale_margin > 0.0 && self.scale_margin < 1.0) {
            return Err(KpmError::InvalidConfig(format!(
                "scale margin must lie in (0, 1), got {}",
                self.scale_margin
            )));
        }
        if let Some((min, max)) = self.energy_bounds {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(KpmError::InvalidConfig(format!(
                    "energy bounds must satisfy min < max, got ({}, {})",
                    min, max
                )));
            }
        }
        self.kernel.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = KpmConfig::default();
        assert_eq!(c.lambda, 4.0);
        assert_eq!(c.optimization_level, OptimizationLevel::Level3);
        assert_eq!(c.bounds_precision, 0.002);
        assert!(c.energy_bounds.is_none());
        assert_eq!(KpmConfig::gpu_default().optimization_level, OptimizationLevel::Level1);
    }

    #[test]
    fn levels_clamp_to_nearest_supported() {
        assert_eq!(OptimizationLevel::from_level(7), OptimizationLevel::Level3);
        assert_eq!(OptimizationLevel::from_level(1), OptimizationLevel::Level1);
        assert!(OptimizationLevel::Level2.interleaves());
        assert!(!OptimizationLevel::Level1.interleaves());
    }

    #[test]
    fn validation_rejects_inverted_bounds() {
        let c = KpmConfig::default().with_energy_bounds(1.0, -1.0);
        assert!(matches!(c.validate(), Err(KpmError::InvalidConfig(_))));
        let c = KpmConfig::default().with_lambda(0.0);
        assert!(c.validate().is_err());
        assert!(KpmConfig::default().validate().is_ok());
    }
}
