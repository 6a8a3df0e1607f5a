pub mod traits;
pub mod wrappers;

pub use traits::{HamiltonianModel, LinearOperator, Scalar, SiteGeometry};
pub use wrappers::{dot, norm};
