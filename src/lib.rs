//! kpmkit: kernel polynomial method for large sparse Hermitian operators
//!
//! This crate computes Green's function elements and local densities of states by Chebyshev
//! expansion of a rescaled Hamiltonian, without diagonalization. The moment recursion runs over
//! plain, reordered, interleaved or ELLPACK sparse layouts selected by an optimization level,
//! optionally on a CUDA device, and independent requests can be fanned out over worker threads.

pub mod backend;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod model;
pub mod parallel;
pub mod results;
pub mod solver;
pub mod system;
pub mod utils;

// Re-exports for convenience
pub use backend::{Capabilities, CpuBackend, MomentBackend};
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use error::*;
pub use kernel::{KernelKind, KernelReconstructor, moments_diverged, required_moments};
pub use matrix::*;
pub use model::TightBindingModel;
pub use parallel::*;
pub use results::Ldos;
pub use solver::*;
pub use system::{SiteLocator, Sites};
pub use utils::*;

// Re-export the Lanczos statistics at the crate root for convenience
pub use utils::convergence::BoundsStats;
