//! Positions and sublattices resolve to matrix indices before any recursion runs.

use kpmkit::{CsrMatrix, Kpm, KpmConfig, KpmError, Sites, TightBindingModel};

/// Two-sublattice chain (A at even, B at odd indices) with alternating on-site energy ±m.
fn staggered_chain(n: usize, m: f64) -> TightBindingModel<f64> {
    let mut triplets = Vec::new();
    for i in 0..n {
        triplets.push((i, i, if i % 2 == 0 { m } else { -m }));
        if i + 1 < n {
            triplets.push((i, i + 1, -1.0));
            triplets.push((i + 1, i, -1.0));
        }
    }
    let positions = (0..n).map(|i| [i as f64, 0.0, 0.0]).collect();
    let sublattices = (0..n).map(|i| (i % 2) as u16).collect();
    let sites = Sites::new(positions, sublattices).unwrap();
    TightBindingModel::new(CsrMatrix::from_triplets(n, n, &triplets).unwrap(), sites).unwrap()
}

fn engine() -> Kpm<TightBindingModel<f64>> {
    Kpm::new(staggered_chain(200, 0.5), KpmConfig::default().with_energy_bounds(-2.5, 2.5)).unwrap()
}

#[test]
fn sublattice_filter_picks_the_nearest_matching_site() {
    let kpm = engine();
    assert_eq!(kpm.locate([100.2, 0.0, 0.0], None).unwrap(), 100);
    assert_eq!(kpm.locate([100.2, 0.0, 0.0], Some(1)).unwrap(), 101);
    assert_eq!(kpm.locate([100.2, 3.0, -1.0], Some(0)).unwrap(), 100);
    assert_eq!(kpm.locate([-50.0, 0.0, 0.0], Some(1)).unwrap(), 1);
}

#[test]
fn ldos_follows_the_sublattice() {
    let kpm = engine();
    // the gap is (-0.5, 0.5); above it the B sublattice carries less weight than A
    let energies = [1.0];
    let a = kpm.ldos(&energies, 0.05, [100.0, 0.0, 0.0], Some(0)).unwrap();
    let b = kpm.ldos(&energies, 0.05, [100.0, 0.0, 0.0], Some(1)).unwrap();
    assert!(a.values()[0] > b.values()[0]);
    // same site, same answer
    let direct = kpm.ldos(&energies, 0.05, [100.0, 0.0, 0.0], None).unwrap();
    assert_eq!(direct, a);
}

#[test]
fn unknown_sublattice_is_an_error() {
    let kpm = engine();
    let err = kpm.ldos(&[0.0], 0.05, [10.0, 0.0, 0.0], Some(2)).unwrap_err();
    assert!(matches!(err, KpmError::NoMatchingSite { sublattice: Some(2) }));
    assert!(kpm.last_report().is_none());
}

#[test]
fn geometry_must_match_the_operator() {
    let h = CsrMatrix::from_triplets(3, 3, &[(0, 1, -1.0), (1, 0, -1.0)]).unwrap();
    assert!(matches!(
        TightBindingModel::new(h, Sites::chain(4, 1.0)),
        Err(KpmError::InvalidOperator(_))
    ));
}
