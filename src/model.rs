//! A ready-made model: an owned Hamiltonian plus its site geometry.

use crate::core::traits::{HamiltonianModel, Scalar, SiteGeometry};
use crate::error::{KpmError, Result};
use crate::matrix::CsrMatrix;
use crate::system::Sites;
use std::sync::Arc;

/// Tight-binding model built from a sparse Hamiltonian and one site per matrix index.
#[derive(Debug, Clone)]
pub struct TightBindingModel<S> {
    hamiltonian: Arc<CsrMatrix<S>>,
    sites: Sites,
}

impl<S: Scalar> TightBindingModel<S> {
    pub fn new(hamiltonian: CsrMatrix<S>, sites: Sites) -> Result<Self> {
        check_dimensions(&hamiltonian, &sites)?;
        Ok(Self {
            hamiltonian: Arc::new(hamiltonian),
            sites,
        })
    }

    /// Replace the Hamiltonian, e.g. after changing a field. Engines holding this model notice
    /// the new operator on their next request.
    pub fn set_hamiltonian(&mut self, hamiltonian: CsrMatrix<S>) -> Result<()> {
        check_dimensions(&hamiltonian, &self.sites)?;
        self.hamiltonian = Arc::new(hamiltonian);
        Ok(())
    }

    pub fn sites(&self) -> &Sites {
        &self.sites
    }
}

fn check_dimensions<S: Scalar>(hamiltonian: &CsrMatrix<S>, sites: &Sites) -> Result<()> {
    if hamiltonian.nrows() != hamiltonian.ncols() || hamiltonian.nrows() != sites.num_sites() {
        return Err(KpmError::InvalidOperator(format!(
            "{}x{} Hamiltonian for {} sites",
            hamiltonian.nrows(),
            hamiltonian.ncols(),
            sites.num_sites()
        )));
    }
    Ok(())
}

impl<S: Scalar> HamiltonianModel for TightBindingModel<S> {
    type Scalar = S;

    fn hamiltonian(&self) -> Arc<CsrMatrix<S>> {
        Arc::clone(&self.hamiltonian)
    }

    fn system(&self) -> &dyn SiteGeometry {
        &self.sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_the_hamiltonian_changes_identity() {
        let h = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
        let mut model = TightBindingModel::new(h.clone(), Sites::chain(2, 1.0)).unwrap();
        let before = model.hamiltonian();
        assert!(Arc::ptr_eq(&before, &model.hamiltonian()));
        model.set_hamiltonian(h).unwrap();
        assert!(!Arc::ptr_eq(&before, &model.hamiltonian()));
        assert_eq!(model.dimension(), 2);
    }

    #[test]
    fn site_count_must_match() {
        let h = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
        assert!(matches!(
            TightBindingModel::new(h, Sites::chain(3, 1.0)),
            Err(KpmError::InvalidOperator(_))
        ));
    }
}
