//! Convergence tracking for the Lanczos bounds estimate.

/// Stopping criteria: relative change of the extreme Ritz values.
#[derive(Clone, Debug)]
pub struct Convergence {
    pub tol: f64,
    pub max_iters: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundsStats {
    pub iterations: usize,
    pub min: f64,
    pub max: f64,
    pub converged: bool,
}

impl Convergence {
    /// Returns (should_stop, stats) given the previous and current `(min, max)` estimates at
    /// iteration `i`. Both extremes must move by less than `tol` times the current width.
    pub fn check(&self, previous: (f64, f64), current: (f64, f64), i: usize) -> (bool, BoundsStats) {
        let width = (current.1 - current.0).abs().max(f64::MIN_POSITIVE);
        let settled = (current.0 - previous.0).abs() <= self.tol * width
            && (current.1 - previous.1).abs() <= self.tol * width;
        (
            settled || i >= self.max_iters,
            BoundsStats {
                iterations: i,
                min: current.0,
                max: current.1,
                converged: settled,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_on_small_relative_change() {
        let conv = Convergence { tol: 1e-3, max_iters: 100 };
        let (stop, stats) = conv.check((-1.0, 1.0), (-1.0005, 1.0005), 10);
        assert!(stop);
        assert!(stats.converged);
        let (stop, _) = conv.check((-0.5, 0.5), (-1.0, 1.0), 10);
        assert!(!stop);
    }

    #[test]
    fn stops_at_cap_without_convergence() {
        let conv = Convergence { tol: 1e-6, max_iters: 5 };
        let (stop, stats) = conv.check((-0.5, 0.5), (-1.0, 1.0), 5);
        assert!(stop);
        assert!(!stats.converged);
    }
}
