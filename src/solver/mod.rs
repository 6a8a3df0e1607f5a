//! Spectral bounds, rescaling and the Chebyshev moment recursion.

pub mod scaling;
pub use scaling::{Scaling, SpectralBounds, MIN_SPECTRAL_WIDTH};

pub mod lanczos;
pub use lanczos::{LanczosEstimate, SpectralBoundsEstimator};

pub mod moments;
pub use moments::{MomentRecursion, MomentSeries, RecursionBuffers};
