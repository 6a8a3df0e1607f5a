//! Energy bounds: Lanczos estimates, user-supplied bounds, and what happens when they are wrong.

use kpmkit::{CsrMatrix, Kpm, KpmConfig, KpmError, Sites, TightBindingModel};
use std::f64::consts::PI;

fn chain(n: usize) -> TightBindingModel<f64> {
    let mut triplets = Vec::with_capacity(2 * n);
    for i in 0..n - 1 {
        triplets.push((i, i + 1, -1.0));
        triplets.push((i + 1, i, -1.0));
    }
    TightBindingModel::new(CsrMatrix::from_triplets(n, n, &triplets).unwrap(), Sites::chain(n, 1.0)).unwrap()
}

#[test]
fn estimated_bounds_bracket_the_chain_spectrum() {
    let n = 500;
    let kpm = Kpm::new(chain(n), KpmConfig::default()).unwrap();
    let bounds = kpm.session().unwrap().bounds();
    let edge = 2.0 * (PI / (n + 1) as f64).cos();
    assert!(bounds.min <= -edge, "min {} above {}", bounds.min, -edge);
    assert!(bounds.max >= edge, "max {} below {}", bounds.max, edge);
    // not absurdly loose either
    assert!(bounds.width() < 4.2);
    let stats = kpm.session().unwrap().lanczos().cloned().unwrap();
    assert!(stats.iterations <= n);
}

#[test]
fn overestimated_bounds_give_the_same_band_centre() {
    let energies = [-0.4, 0.0, 0.4];
    let site = [1000.0, 0.0, 0.0];
    let auto = Kpm::new(chain(2001), KpmConfig::default())
        .unwrap()
        .ldos(&energies, 0.05, site, None)
        .unwrap();
    let wide = Kpm::new(chain(2001), KpmConfig::default().with_energy_bounds(-4.0, 4.0))
        .unwrap()
        .ldos(&energies, 0.05, site, None)
        .unwrap();
    for (a, w) in auto.values().iter().zip(wide.values()) {
        assert!((a - w).abs() < 0.03 * a, "auto {} vs wide {}", a, w);
    }
}

#[test]
fn wider_bounds_need_more_moments() {
    let run = |min, max| {
        let kpm = Kpm::new(chain(100), KpmConfig::default().with_energy_bounds(min, max)).unwrap();
        kpm.ldos(&[0.0], 0.1, [50.0, 0.0, 0.0], None).unwrap();
        let report = kpm.last_report().unwrap();
        assert!(report.lanczos_iterations.is_none());
        report.num_moments
    };
    assert!(run(-8.0, 8.0) > run(-2.1, 2.1));
}

#[test]
fn underestimated_bounds_diverge_without_error() {
    let kpm = Kpm::new(chain(400), KpmConfig::default().with_energy_bounds(-1.0, 1.0)).unwrap();
    let ldos = kpm.ldos(&[-0.5, 0.0, 0.5], 0.002, [200.0, 0.0, 0.0], None).unwrap();
    assert!(ldos.values().iter().any(|v| !v.is_finite()));
    let report = kpm.last_report().unwrap();
    assert!(report.diverged);
    assert!(kpm.report(false).contains("non-finite values"));
}

/// Half-width bounds at ordinary broadening: the moments stay finite but exceed 1 in magnitude,
/// which no correctly rescaled operator can produce.
#[test]
fn underestimated_bounds_diverge_at_ordinary_broadening() {
    let kpm = Kpm::new(chain(400), KpmConfig::default().with_energy_bounds(-1.0, 1.0)).unwrap();
    for broadening in [0.1, 0.05] {
        let ldos = kpm.ldos(&[-0.5, 0.0, 0.5], broadening, [200.0, 0.0, 0.0], None).unwrap();
        assert!(ldos.values().iter().all(|v| v.is_nan()), "broadening {}: {:?}", broadening, ldos.values());
        assert!(kpm.last_report().unwrap().diverged);

        let moments = kpm.moments(200, 200, broadening).unwrap();
        assert!(moments.iter().all(|m| m.is_finite()));
        assert!(kpm.last_report().unwrap().diverged);

        let g = kpm.green_element(200, 201, &[0.0], broadening).unwrap();
        assert!(!g[0].is_finite());
    }
    // correct bounds on the same chain stay clean
    let ok = Kpm::new(chain(400), KpmConfig::default().with_energy_bounds(-2.1, 2.1)).unwrap();
    let ldos = ok.ldos(&[-0.5, 0.0, 0.5], 0.1, [200.0, 0.0, 0.0], None).unwrap();
    assert!(ldos.values().iter().all(|v| v.is_finite() && *v > 0.0));
    assert!(!ok.last_report().unwrap().diverged);
}

#[test]
fn inverted_or_empty_bounds_are_rejected() {
    assert!(matches!(
        Kpm::new(chain(10), KpmConfig::default().with_energy_bounds(1.0, -1.0)),
        Err(KpmError::InvalidConfig(_))
    ));
    assert!(matches!(
        Kpm::new(chain(10), KpmConfig::default().with_lambda(0.0)),
        Err(KpmError::InvalidConfig(_))
    ));
}

#[test]
fn non_hermitian_operator_is_rejected() {
    let h = CsrMatrix::from_triplets(3, 3, &[(0, 1, 1.0), (1, 2, 1.0), (2, 1, 1.0)]).unwrap();
    let model = TightBindingModel::new(h, Sites::chain(3, 1.0)).unwrap();
    assert!(matches!(Kpm::new(model, KpmConfig::default()), Err(KpmError::InvalidOperator(_))));
}
