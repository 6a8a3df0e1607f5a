use thiserror::Error;

// Unified error type for kpmkit

#[derive(Error, Debug)]
pub enum KpmError {
    #[error("invalid operator: {0}")]
    InvalidOperator(String),
    #[error("index {index} out of range for operator of dimension {dim}")]
    InvalidIndex { index: usize, dim: usize },
    #[error("no site matches sublattice filter {sublattice:?}")]
    NoMatchingSite { sublattice: Option<u16> },
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("deferred computation was cancelled before it started")]
    Cancelled,
    #[error("worker running a deferred computation panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, KpmError>;
