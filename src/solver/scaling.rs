//! Spectral bounds and the affine map into the Chebyshev domain.

/// Widths below this are treated as a single eigenvalue and widened to it.
pub const MIN_SPECTRAL_WIDTH: f64 = 1e-6;

/// Lower and upper bound on the spectrum of an operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralBounds {
    pub min: f64,
    pub max: f64,
}

impl SpectralBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn center(&self) -> f64 {
        0.5 * (self.max + self.min)
    }

    /// Rescaling `H' = (H - b) / a` with `a = width / (2 - margin)` and `b` the center, which
    /// maps the bounds onto `[-1 + margin/2, 1 - margin/2]`.
    pub fn scaling(&self, margin: f64) -> Scaling {
        let width = self.width().max(MIN_SPECTRAL_WIDTH);
        Scaling {
            a: width / (2.0 - margin),
            b: self.center(),
        }
    }
}

/// Affine map between energies and the Chebyshev variable `x = (E - b) / a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub a: f64,
    pub b: f64,
}

impl Scaling {
    #[inline]
    pub fn scale_energy(&self, energy: f64) -> f64 {
        (energy - self.b) / self.a
    }

    #[inline]
    pub fn unscale(&self, x: f64) -> f64 {
        x * self.a + self.b
    }
}
