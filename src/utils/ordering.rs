//! Breadth-first row reordering for the truncated Chebyshev recursion.
//!
//! Rows are sorted by graph distance from a seed index. After `n` recursion steps a vector started
//! at the seed can only be nonzero within `n` hops, so the sparse apply may stop at the end of the
//! corresponding shell.

use crate::matrix::CsrMatrix;
use std::collections::VecDeque;

/// Extract a symmetrized adjacency list from a matrix pattern:
/// adj[i] = { j | A[i,j] stored or A[j,i] stored, j != i }
pub fn extract_adjacency<S>(m: &CsrMatrix<S>) -> Vec<Vec<usize>>
where
    S: crate::core::Scalar,
{
    let n = m.nrows();
    let mut adj = vec![Vec::new(); n];
    for i in 0..n {
        for &j in m.row(i).0 {
            if i != j {
                adj[i].push(j);
                adj[j].push(i);
            }
        }
    }
    for list in &mut adj {
        list.sort_unstable();
        list.dedup();
    }
    adj
}

/// Bijection between original and internal row numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    /// forward[original] = internal
    forward: Vec<usize>,
    /// backward[internal] = original
    backward: Vec<usize>,
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Self {
            forward: (0..n).collect(),
            backward: (0..n).collect(),
        }
    }

    /// Build from the internal ordering: `order[internal] = original`.
    pub fn from_order(order: Vec<usize>) -> Self {
        let mut forward = vec![0; order.len()];
        for (internal, &original) in order.iter().enumerate() {
            forward[original] = internal;
        }
        Self { forward, backward: order }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Internal index of an original index.
    #[inline]
    pub fn to_internal(&self, original: usize) -> usize {
        self.forward[original]
    }

    /// Original index of an internal index.
    #[inline]
    pub fn to_original(&self, internal: usize) -> usize {
        self.backward[internal]
    }

    /// Reorder a vector from original into internal numbering.
    pub fn permute<T: Copy>(&self, original: &[T]) -> Vec<T> {
        self.backward.iter().map(|&o| original[o]).collect()
    }

    /// Inverse of [`Permutation::permute`].
    pub fn unpermute<T: Copy>(&self, internal: &[T]) -> Vec<T> {
        self.forward.iter().map(|&k| internal[k]).collect()
    }
}

/// Result of a breadth-first ordering.
#[derive(Debug, Clone)]
pub struct BfsOrdering {
    pub permutation: Permutation,
    /// shells[d] = number of rows within distance d of the seed (cumulative).
    pub shells: Vec<usize>,
}

impl BfsOrdering {
    /// Rows that may be nonzero after `step` recursion steps from the seed.
    pub fn reach(&self, step: usize) -> usize {
        match self.shells.get(step) {
            Some(&count) => count,
            None => self.shells.last().copied().unwrap_or(0),
        }
    }
}

/// Order rows by breadth-first distance from `seed`.
///
/// Rows unreachable from the seed are placed after every shell; they never become active.
pub fn bfs_ordering(adj: &[Vec<usize>], seed: usize) -> BfsOrdering {
    let n = adj.len();
    let mut dist = vec![usize::MAX; n];
    let mut order = Vec::with_capacity(n);
    let mut shells = Vec::new();
    let mut queue = VecDeque::new();
    dist[seed] = 0;
    queue.push_back(seed);
    while let Some(i) = queue.pop_front() {
        let d = dist[i];
        if shells.len() <= d {
            shells.push(order.len());
        }
        order.push(i);
        for &j in &adj[i] {
            if dist[j] == usize::MAX {
                dist[j] = d + 1;
                queue.push_back(j);
            }
        }
    }
    // shells[d] currently marks the start of shell d; shift to cumulative ends.
    let reached = order.len();
    let mut cumulative: Vec<usize> = shells.iter().skip(1).copied().collect();
    cumulative.push(reached);
    order.extend((0..n).filter(|&i| dist[i] == usize::MAX));
    BfsOrdering {
        permutation: Permutation::from_order(order),
        shells: cumulative,
    }
}
