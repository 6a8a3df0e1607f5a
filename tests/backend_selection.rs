//! Backend construction and level negotiation.

use kpmkit::{Capabilities, CpuBackend, CsrMatrix, Kpm, KpmConfig, KpmError, OptimizationLevel, Sites, TightBindingModel};

fn dimer() -> TightBindingModel<f64> {
    let h = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
    TightBindingModel::new(h, Sites::chain(2, 1.0)).unwrap()
}

#[test]
fn host_backend_runs_every_level() {
    for level in OptimizationLevel::ALL {
        let kpm = Kpm::new(dimer(), KpmConfig::default().with_optimization_level(level)).unwrap();
        assert_eq!(kpm.backend_name(), "cpu");
        assert_eq!(kpm.optimization_level(), level);
    }
    assert!(CpuBackend::CAPABILITIES.contains(Capabilities::ALL_LEVELS | Capabilities::COMPLEX));
    assert!(!CpuBackend::CAPABILITIES.contains(Capabilities::DEVICE));
}

#[test]
fn device_levels_fall_back_to_the_nearest_supported() {
    let caps = Capabilities::LEVEL_0 | Capabilities::LEVEL_1 | Capabilities::DEVICE;
    assert_eq!(caps.nearest_level(OptimizationLevel::Level3), OptimizationLevel::Level1);
    assert_eq!(caps.nearest_level(OptimizationLevel::Level0), OptimizationLevel::Level0);
}

#[cfg(not(feature = "cuda"))]
#[test]
fn cuda_engine_is_unsupported_in_this_build() {
    let err = Kpm::new_cuda(dimer(), KpmConfig::gpu_default()).err().unwrap();
    assert!(matches!(err, KpmError::UnsupportedBackend(_)));
}
