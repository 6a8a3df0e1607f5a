//! Core traits for kpmkit: scalar arithmetic, operator application and the
//! collaborator interfaces (model and site geometry providers).

use crate::error::Result;
use crate::matrix::CsrMatrix;
use num_complex::Complex64;
use std::sync::Arc;

/// Matrix element type of a Hermitian operator (real or complex).
pub trait Scalar:
    Copy
    + Send
    + Sync
    + std::fmt::Debug
    + PartialEq
    + 'static
    + num_traits::Zero
    + num_traits::One
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Neg<Output = Self>
    + std::ops::AddAssign
{
    /// Embed a real number.
    fn from_real(x: f64) -> Self;
    /// Build from real and imaginary parts; real scalars drop `im`.
    fn from_parts(re: f64, im: f64) -> Self;
    /// Complex conjugate (identity for real scalars).
    fn conj(self) -> Self;
    /// Real part.
    fn real(self) -> f64;
    /// |x|².
    fn abs_sqr(self) -> f64;
    /// Multiply by a real factor.
    fn scale(self, factor: f64) -> Self;
    fn to_complex(self) -> Complex64;
    fn is_finite(self) -> bool;
}

/// Operator application: y ← A x.
pub trait LinearOperator<S> {
    /// Dimension of the (square) operator.
    fn dim(&self) -> usize;
    /// Compute y = A · x. Fails if the vector lengths do not match `dim()`.
    fn apply_into(&self, x: &[S], y: &mut [S]) -> Result<()>;
}

/// Supplies the Hermitian operator. The engine treats each fetched operator
/// as immutable; a provider whose Hamiltonian changes hands out a new `Arc`.
pub trait HamiltonianModel: Send + Sync {
    type Scalar: Scalar;
    /// Current Hamiltonian.
    fn hamiltonian(&self) -> Arc<CsrMatrix<Self::Scalar>>;
    /// Site positions and sublattices, one per matrix index.
    fn system(&self) -> &dyn SiteGeometry;
    /// Matrix dimension.
    fn dimension(&self) -> usize {
        self.hamiltonian().nrows()
    }
}

/// Positions and sublattice labels per matrix index.
pub trait SiteGeometry: Send + Sync {
    fn num_sites(&self) -> usize;
    /// Cartesian position of the site at `index`.
    fn position(&self, index: usize) -> [f64; 3];
    /// Sublattice label of the site at `index`.
    fn sublattice(&self, index: usize) -> u16;
}
