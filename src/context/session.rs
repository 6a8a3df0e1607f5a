//! Per-operator state shared by every request: bounds, rescaling and prepared adapters.

use crate::config::{KpmConfig, OptimizationLevel};
use crate::core::traits::Scalar;
use crate::error::{KpmError, Result};
use crate::matrix::{CsrMatrix, OperatorAdapter};
use crate::solver::{Scaling, SpectralBounds, SpectralBoundsEstimator};
use crate::utils::convergence::BoundsStats;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Relative tolerance of the Hermiticity check.
pub const HERMITIAN_TOL: f64 = 1e-10;
/// Prepared adapters kept per session before the cache is flushed.
const ADAPTER_CACHE: usize = 32;

/// Rescaled view of one operator.
///
/// A session is tied to a single `Arc<CsrMatrix>`; a model that hands out a different `Arc`
/// gets a new session. Adapters are built lazily, one per (level, start index) at levels that
/// reorder and one per level otherwise.
pub struct Session<S> {
    operator: Arc<CsrMatrix<S>>,
    bounds: SpectralBounds,
    scaling: Scaling,
    lanczos: Option<BoundsStats>,
    adapters: Mutex<HashMap<(OptimizationLevel, usize), Arc<OperatorAdapter<S>>>>,
}

impl<S: Scalar> Session<S> {
    /// Validate the operator and fix its rescaling, estimating bounds unless the config
    /// supplies them.
    pub fn new(operator: Arc<CsrMatrix<S>>, config: &KpmConfig) -> Result<Self> {
        config.validate()?;
        if operator.nrows() == 0 {
            return Err(KpmError::InvalidOperator("operator has dimension 0".to_string()));
        }
        operator.check_hermitian(HERMITIAN_TOL)?;

        let (bounds, lanczos) = match config.energy_bounds {
            Some((min, max)) => (SpectralBounds::new(min, max), None),
            None => {
                let estimate = SpectralBoundsEstimator::new(config.bounds_precision, config.lanczos_max_iterations)
                    .with_seed(config.lanczos_seed)
                    .estimate(operator.as_ref())?;
                (estimate.bounds, Some(estimate.stats))
            }
        };
        let scaling = bounds.scaling(config.scale_margin);
        log::info!(
            "kpm session: n = {}, nnz = {}, bounds ({:.6}, {:.6}), a = {:.6}, b = {:.6}",
            operator.nrows(),
            operator.nnz(),
            bounds.min,
            bounds.max,
            scaling.a,
            scaling.b
        );
        Ok(Self {
            operator,
            bounds,
            scaling,
            lanczos,
            adapters: Mutex::new(HashMap::new()),
        })
    }

    pub fn operator(&self) -> &Arc<CsrMatrix<S>> {
        &self.operator
    }

    /// Whether `operator` is the very matrix this session was built from.
    pub fn is_current(&self, operator: &Arc<CsrMatrix<S>>) -> bool {
        Arc::ptr_eq(&self.operator, operator)
    }

    pub fn dim(&self) -> usize {
        self.operator.nrows()
    }

    pub fn bounds(&self) -> SpectralBounds {
        self.bounds
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    /// Statistics of the Lanczos estimate, `None` when bounds were supplied.
    pub fn lanczos(&self) -> Option<&BoundsStats> {
        self.lanczos.as_ref()
    }

    /// Adapter for a recursion started at `start`.
    pub fn adapter(&self, level: OptimizationLevel, start: usize) -> Result<Arc<OperatorAdapter<S>>> {
        if start >= self.dim() {
            return Err(KpmError::InvalidIndex {
                index: start,
                dim: self.dim(),
            });
        }
        let key = (level, if level.reorders() { start } else { 0 });
        if let Some(adapter) = self.adapters.lock().get(&key) {
            return Ok(Arc::clone(adapter));
        }
        // Built outside the lock so concurrent requests for other starts are not serialized.
        let adapter = Arc::new(OperatorAdapter::build(&self.operator, self.scaling, level, start)?);
        let mut cache = self.adapters.lock();
        if cache.len() >= ADAPTER_CACHE {
            cache.clear();
        }
        Ok(Arc::clone(cache.entry(key).or_insert(adapter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimer(t: f64) -> Arc<CsrMatrix<f64>> {
        Arc::new(CsrMatrix::from_triplets(2, 2, &[(0, 1, t), (1, 0, t)]).unwrap())
    }

    #[test]
    fn supplied_bounds_skip_lanczos() {
        let config = KpmConfig::default().with_energy_bounds(-1.5, 1.5);
        let session = Session::new(dimer(1.0), &config).unwrap();
        assert!(session.lanczos().is_none());
        assert_eq!(session.bounds(), SpectralBounds::new(-1.5, 1.5));
    }

    #[test]
    fn estimated_bounds_cover_the_spectrum() {
        let session = Session::new(dimer(1.0), &KpmConfig::default()).unwrap();
        assert!(session.lanczos().is_some());
        assert!(session.bounds().min <= -1.0 && session.bounds().max >= 1.0);
    }

    #[test]
    fn adapters_are_shared_where_the_layout_allows() {
        let session = Session::new(dimer(1.0), &KpmConfig::default()).unwrap();
        let a = session.adapter(OptimizationLevel::Level0, 0).unwrap();
        let b = session.adapter(OptimizationLevel::Level0, 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = session.adapter(OptimizationLevel::Level1, 0).unwrap();
        let d = session.adapter(OptimizationLevel::Level1, 1).unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
        assert!(matches!(
            session.adapter(OptimizationLevel::Level1, 2),
            Err(KpmError::InvalidIndex { index: 2, dim: 2 })
        ));
    }

    #[test]
    fn rejects_non_hermitian_and_empty_operators() {
        let skew = Arc::new(CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, -1.0)]).unwrap());
        assert!(matches!(
            Session::new(skew, &KpmConfig::default()),
            Err(KpmError::InvalidOperator(_))
        ));
        let empty = Arc::new(CsrMatrix::<f64>::from_triplets(0, 0, &[]).unwrap());
        assert!(matches!(
            Session::new(empty, &KpmConfig::default()),
            Err(KpmError::InvalidOperator(_))
        ));
    }
}
