//! Statistics of one computation.

use crate::config::OptimizationLevel;
use crate::solver::{Scaling, SpectralBounds};
use std::fmt;
use std::time::Duration;

/// What a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Computation {
    GreenElement,
    Ldos,
    Moments,
    Batch,
}

impl fmt::Display for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Computation::GreenElement => "green",
            Computation::Ldos => "ldos",
            Computation::Moments => "moments",
            Computation::Batch => "batch",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot of a finished computation.
#[derive(Debug, Clone, PartialEq)]
pub struct KpmReport {
    pub computation: Computation,
    /// Moments per matrix element.
    pub num_moments: usize,
    /// Matrix elements computed.
    pub requests: usize,
    /// Sparse applies summed over all requests.
    pub applies: usize,
    pub elapsed: Duration,
    pub optimization_level: OptimizationLevel,
    pub backend: &'static str,
    pub bounds: SpectralBounds,
    pub scaling: Scaling,
    /// Lanczos iterations, `None` when the bounds were supplied.
    pub lanczos_iterations: Option<usize>,
    /// Some output value is not finite, usually because the bounds were underestimated.
    pub diverged: bool,
}

impl KpmReport {
    /// One line for `short`, a labeled block otherwise.
    pub fn render(&self, short: bool) -> String {
        if short {
            format!(
                "{} moments x {} in {:.3} s (level {}, {})",
                self.num_moments,
                self.requests,
                self.elapsed.as_secs_f64(),
                self.optimization_level,
                self.backend
            )
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for KpmReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "computation:        {}", self.computation)?;
        writeln!(f, "backend:            {} (level {})", self.backend, self.optimization_level)?;
        writeln!(f, "moments:            {} per element, {} element(s)", self.num_moments, self.requests)?;
        writeln!(f, "sparse applies:     {}", self.applies)?;
        writeln!(f, "bounds:             [{:.6}, {:.6}]", self.bounds.min, self.bounds.max)?;
        writeln!(f, "scaling:            a = {:.6}, b = {:.6}", self.scaling.a, self.scaling.b)?;
        match self.lanczos_iterations {
            Some(it) => writeln!(f, "lanczos iterations: {}", it)?,
            None => writeln!(f, "lanczos iterations: bounds supplied")?,
        }
        if self.diverged {
            writeln!(f, "warning:            non-finite values, energy bounds are likely too small")?;
        }
        write!(f, "time:               {:.3} s", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> KpmReport {
        KpmReport {
            computation: Computation::Ldos,
            num_moments: 512,
            requests: 1,
            applies: 256,
            elapsed: Duration::from_millis(1250),
            optimization_level: OptimizationLevel::Level3,
            backend: "cpu",
            bounds: SpectralBounds::new(-3.0, 3.0),
            scaling: Scaling { a: 3.015, b: 0.0 },
            lanczos_iterations: Some(35),
            diverged: false,
        }
    }

    #[test]
    fn short_report_is_one_line() {
        let s = report().render(true);
        assert_eq!(s, "512 moments x 1 in 1.250 s (level 3, cpu)");
    }

    #[test]
    fn long_report_lists_bounds_and_divergence() {
        let mut r = report();
        r.diverged = true;
        let s = r.render(false);
        assert!(s.contains("bounds:             [-3.000000, 3.000000]"));
        assert!(s.contains("lanczos iterations: 35"));
        assert!(s.contains("warning"));
    }
}
