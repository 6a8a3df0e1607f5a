//! Utilities: convergence tracking and row orderings.

pub mod convergence;
pub mod ordering;

pub use convergence::{BoundsStats, Convergence};
pub use ordering::{BfsOrdering, Permutation, bfs_ordering, extract_adjacency};
