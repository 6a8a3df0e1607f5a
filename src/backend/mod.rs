//! Moment backends: who runs the recursion, and at which levels.
//!
//! A backend is chosen once, when the engine is built, and reports its [`Capabilities`]. A
//! requested optimization level it cannot serve is lowered to the nearest level it supports.

use crate::config::OptimizationLevel;
use crate::context::session::Session;
use crate::core::traits::Scalar;
use crate::error::Result;
use crate::solver::{MomentRecursion, MomentSeries, RecursionBuffers};
use bitflags::bitflags;

#[cfg(feature = "cuda")]
pub mod cuda;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const LEVEL_0  = 0b0000_0001;
        const LEVEL_1  = 0b0000_0010;
        const LEVEL_2  = 0b0000_0100;
        const LEVEL_3  = 0b0000_1000;
        const ALL_LEVELS = Self::LEVEL_0.bits() | Self::LEVEL_1.bits() | Self::LEVEL_2.bits() | Self::LEVEL_3.bits();
        /// Complex operators are supported.
        const COMPLEX  = 0b0001_0000;
        /// Work runs on an accelerator.
        const DEVICE   = 0b0010_0000;
    }
}

impl Capabilities {
    fn level_flag(level: OptimizationLevel) -> Capabilities {
        match level {
            OptimizationLevel::Level0 => Capabilities::LEVEL_0,
            OptimizationLevel::Level1 => Capabilities::LEVEL_1,
            OptimizationLevel::Level2 => Capabilities::LEVEL_2,
            OptimizationLevel::Level3 => Capabilities::LEVEL_3,
        }
    }

    pub fn supports(self, level: OptimizationLevel) -> bool {
        self.contains(Self::level_flag(level))
    }

    /// Highest supported level not above `requested`, or the lowest supported level.
    pub fn nearest_level(self, requested: OptimizationLevel) -> OptimizationLevel {
        OptimizationLevel::ALL
            .iter()
            .rev()
            .copied()
            .find(|&l| l <= requested && self.supports(l))
            .or_else(|| OptimizationLevel::ALL.iter().copied().find(|&l| self.supports(l)))
            .unwrap_or(OptimizationLevel::Level0)
    }
}

/// Computes Chebyshev moments of one matrix element over a session.
pub trait MomentBackend<S: Scalar>: Send + Sync {
    fn name(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;
    /// Level actually used, after any fall-back.
    fn optimization_level(&self) -> OptimizationLevel;
    /// `μ_n = <row| T_n(H') |col>` for `n < num_moments`.
    fn moments(&self, session: &Session<S>, row: usize, col: usize, num_moments: usize) -> Result<MomentSeries>;
}

/// Pick the level a backend will run at, warning when the request is lowered.
pub(crate) fn resolve_level(name: &str, caps: Capabilities, requested: OptimizationLevel) -> OptimizationLevel {
    let level = caps.nearest_level(requested);
    if level != requested {
        log::warn!(
            "{} backend does not support optimization level {}, using level {}",
            name,
            requested,
            level
        );
    }
    level
}

/// Host backend; supports every level.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    level: OptimizationLevel,
}

impl CpuBackend {
    pub const CAPABILITIES: Capabilities = Capabilities::ALL_LEVELS.union(Capabilities::COMPLEX);

    pub fn new(level: OptimizationLevel) -> Self {
        Self {
            level: resolve_level("cpu", Self::CAPABILITIES, level),
        }
    }
}

impl<S: Scalar> MomentBackend<S> for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    fn optimization_level(&self) -> OptimizationLevel {
        self.level
    }

    fn moments(&self, session: &Session<S>, row: usize, col: usize, num_moments: usize) -> Result<MomentSeries> {
        let adapter = session.adapter(self.level, col)?;
        let mut buffers = RecursionBuffers::new(session.dim());
        MomentRecursion::new(&adapter).compute(row, col, num_moments, &mut buffers)
    }
}

/// Accelerator backend for `S`, or `UnsupportedBackend` when none is available.
#[cfg(feature = "cuda")]
pub fn device_backend<S: Scalar>(level: OptimizationLevel) -> Result<Box<dyn MomentBackend<S>>> {
    Ok(Box::new(cuda::CudaBackend::new(level)?))
}

/// Accelerator backend for `S`, or `UnsupportedBackend` when none is available.
#[cfg(not(feature = "cuda"))]
pub fn device_backend<S: Scalar>(level: OptimizationLevel) -> Result<Box<dyn MomentBackend<S>>> {
    let _ = level;
    Err(crate::error::KpmError::UnsupportedBackend(
        "kpmkit was built without the `cuda` feature".to_string(),
    ))
}
