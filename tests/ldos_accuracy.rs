//! Accuracy of KPM spectral functions against closed-form results.
//!
//! The bulk of a long tight-binding chain has the density of states of the infinite chain,
//! `1 / (π sqrt(4 t² - E²))` inside the band. A dimer has two sharp levels whose weights are
//! known exactly, which makes it a good check of the spectral normalization.

use approx::assert_abs_diff_eq;
use kpmkit::{CsrMatrix, KernelKind, Kpm, KpmConfig, Sites, TightBindingModel};
use std::f64::consts::PI;

/// Open chain with hopping `-t` between neighbours.
fn chain(n: usize, t: f64) -> TightBindingModel<f64> {
    let mut triplets = Vec::with_capacity(2 * n);
    for i in 0..n - 1 {
        triplets.push((i, i + 1, -t));
        triplets.push((i + 1, i, -t));
    }
    let h = CsrMatrix::from_triplets(n, n, &triplets).unwrap();
    TightBindingModel::new(h, Sites::chain(n, 1.0)).unwrap()
}

fn infinite_chain_dos(e: f64) -> f64 {
    1.0 / (PI * (4.0 - e * e).sqrt())
}

/// Bulk LDOS of a 2001-site chain agrees with the infinite chain within 2%.
#[test]
fn chain_bulk_ldos_matches_closed_form() {
    let _ = env_logger::builder().is_test(true).try_init();
    let kpm = Kpm::new(chain(2001, 1.0), KpmConfig::default()).unwrap();
    let energies = [-1.0, -0.5, 0.0, 0.5, 1.0];
    let ldos = kpm.ldos(&energies, 0.05, [1000.0, 0.0, 0.0], None).unwrap();
    for (e, value) in ldos.energy().iter().zip(ldos.values()) {
        let exact = infinite_chain_dos(*e);
        assert!(
            (value - exact).abs() < 0.02 * exact,
            "E = {}: kpm {} vs exact {}",
            e,
            value,
            exact
        );
    }
    let report = kpm.last_report().unwrap();
    assert!(!report.diverged);
    assert!(report.lanczos_iterations.is_some());
}

/// A dimer with hopping 1 puts half of the weight of each site at E = -1 and half at E = +1.
#[test]
fn dimer_ldos_is_normalized_and_peaked() {
    let h = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
    let model = TightBindingModel::new(h, Sites::chain(2, 1.0)).unwrap();
    let kpm = Kpm::new(model, KpmConfig::default().with_energy_bounds(-3.0, 3.0)).unwrap();

    let energies: Vec<f64> = (0..=1200).map(|k| -3.0 + 0.005 * k as f64).collect();
    let ldos = kpm.ldos(&energies, 0.1, [0.0; 3], None).unwrap();
    assert_abs_diff_eq!(ldos.integrate(), 1.0, epsilon = 1e-2);

    // the largest values sit at the two levels
    let peak = |lo: f64, hi: f64| {
        ldos.energy()
            .iter()
            .zip(ldos.values())
            .filter(|(e, _)| **e >= lo && **e <= hi)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(e, _)| *e)
            .unwrap()
    };
    assert_abs_diff_eq!(peak(-3.0, 0.0), -1.0, epsilon = 0.02);
    assert_abs_diff_eq!(peak(0.0, 3.0), 1.0, epsilon = 0.02);
    // nothing between the levels
    let mid = ldos.values()[600];
    assert!(mid.abs() < 1e-3, "ldos at E = 0 is {}", mid);
}

/// The Lorentz kernel keeps the Green's function causal: `Im G_ii <= 0` inside the band.
#[test]
fn lorentz_green_function_is_causal() {
    let config = KpmConfig::default()
        .with_kernel(KernelKind::Lorentz { lambda: 4.0 })
        .with_energy_bounds(-2.2, 2.2);
    let kpm = Kpm::new(chain(401, 1.0), config).unwrap();
    let energies: Vec<f64> = (0..41).map(|k| -1.9 + 0.095 * k as f64).collect();
    let g = kpm.green_element(200, 200, &energies, 0.05).unwrap();
    for (e, gi) in energies.iter().zip(&g) {
        assert!(gi.im <= 1e-12, "Im G({}) = {}", e, gi.im);
    }
    // -Im G / π is the LDOS, close to the bulk value at the band centre
    let centre = -g[20].im / PI;
    assert!((centre - infinite_chain_dos(0.0)).abs() < 0.05 * infinite_chain_dos(0.0));
}

/// On a bipartite chain the spectral weight between neighbouring sites is odd in energy, so
/// `Im G_{i,i+1}` vanishes at the band centre.
#[test]
fn nearest_neighbour_spectral_weight_vanishes_at_band_centre() {
    let kpm = Kpm::new(chain(801, 1.0), KpmConfig::default().with_energy_bounds(-2.1, 2.1)).unwrap();
    let g = kpm.green_element(400, 401, &[0.0], 0.05).unwrap();
    assert_abs_diff_eq!(g[0].im, 0.0, epsilon = 1e-3);
}
