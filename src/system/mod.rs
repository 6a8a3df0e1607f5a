//! Site geometry and nearest-site lookup.

use crate::core::traits::SiteGeometry;
use crate::error::{KpmError, Result};
use std::cmp::Ordering;

/// Sites above this count are searched in parallel with `rayon`.
#[cfg(feature = "rayon")]
const PARALLEL_SITES: usize = 16384;

/// Positions and sublattice labels, one per matrix index.
#[derive(Debug, Clone, PartialEq)]
pub struct Sites {
    positions: Vec<[f64; 3]>,
    sublattices: Vec<u16>,
}

impl Sites {
    pub fn new(positions: Vec<[f64; 3]>, sublattices: Vec<u16>) -> Result<Self> {
        if positions.len() != sublattices.len() {
            return Err(KpmError::InvalidConfig(format!(
                "{} positions but {} sublattice labels",
                positions.len(),
                sublattices.len()
            )));
        }
        Ok(Self { positions, sublattices })
    }

    /// All sites on sublattice 0.
    pub fn from_positions(positions: Vec<[f64; 3]>) -> Self {
        let sublattices = vec![0; positions.len()];
        Self { positions, sublattices }
    }

    /// Sites `0..n` on the x axis with the given spacing.
    pub fn chain(n: usize, spacing: f64) -> Self {
        Self::from_positions((0..n).map(|i| [i as f64 * spacing, 0.0, 0.0]).collect())
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    pub fn sublattices(&self) -> &[u16] {
        &self.sublattices
    }
}

impl SiteGeometry for Sites {
    fn num_sites(&self) -> usize {
        self.positions.len()
    }

    fn position(&self, index: usize) -> [f64; 3] {
        self.positions[index]
    }

    fn sublattice(&self, index: usize) -> u16 {
        self.sublattices[index]
    }
}

/// Translates Cartesian positions into matrix indices.
pub struct SiteLocator<'a> {
    geometry: &'a dyn SiteGeometry,
}

impl<'a> SiteLocator<'a> {
    pub fn new(geometry: &'a dyn SiteGeometry) -> Self {
        Self { geometry }
    }

    /// Index of the site closest to `position` (Euclidean), among sites on `sublattice` if
    /// given. Ties go to the lowest index.
    pub fn find_nearest(&self, position: [f64; 3], sublattice: Option<u16>) -> Result<usize> {
        let geometry = self.geometry;
        let candidate = |i: usize| -> Option<(f64, usize)> {
            if sublattice.is_some_and(|s| geometry.sublattice(i) != s) {
                return None;
            }
            let p = geometry.position(i);
            let d2 = (0..3).map(|k| (p[k] - position[k]).powi(2)).sum::<f64>();
            Some((d2, i))
        };
        let n = geometry.num_sites();

        #[cfg(feature = "rayon")]
        let best = if n >= PARALLEL_SITES {
            use rayon::prelude::*;
            (0..n).into_par_iter().filter_map(candidate).reduce_with(closer)
        } else {
            (0..n).filter_map(candidate).reduce(closer)
        };
        #[cfg(not(feature = "rayon"))]
        let best = (0..n).filter_map(candidate).reduce(closer);

        best.map(|(_, i)| i).ok_or(KpmError::NoMatchingSite { sublattice })
    }
}

fn closer(a: (f64, usize), b: (f64, usize)) -> (f64, usize) {
    match a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)) {
        Ordering::Greater => b,
        _ => a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> Sites {
        // two sublattices interleaved on a line
        let positions = (0..10).map(|i| [i as f64 * 0.5, 0.0, 0.0]).collect();
        let sublattices = (0..10).map(|i| (i % 2) as u16).collect();
        Sites::new(positions, sublattices).unwrap()
    }

    #[test]
    fn nearest_site_with_and_without_filter() {
        let sites = lattice();
        let locator = SiteLocator::new(&sites);
        assert_eq!(locator.find_nearest([1.1, 0.0, 0.0], None).unwrap(), 2);
        assert_eq!(locator.find_nearest([1.1, 0.0, 0.0], Some(1)).unwrap(), 3);
        assert_eq!(locator.find_nearest([-7.0, 1.0, 0.0], Some(0)).unwrap(), 0);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let sites = lattice();
        let locator = SiteLocator::new(&sites);
        // halfway between sites 2 and 3
        assert_eq!(locator.find_nearest([1.25, 0.0, 0.0], None).unwrap(), 2);
    }

    #[test]
    fn filter_without_match_fails() {
        let sites = lattice();
        let err = SiteLocator::new(&sites).find_nearest([0.0; 3], Some(7)).unwrap_err();
        assert!(matches!(err, KpmError::NoMatchingSite { sublattice: Some(7) }));
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        assert!(Sites::new(vec![[0.0; 3]; 2], vec![0]).is_err());
    }
}
