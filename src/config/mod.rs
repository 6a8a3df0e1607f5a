//! Configuration types for the KPM engine.

pub mod options;

pub use options::{KpmConfig, OptimizationLevel};
