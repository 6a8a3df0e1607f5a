//! Scalar implementations and vector reductions.
//!
//! This module implements [`Scalar`] for `f64` and `Complex64`, and provides the inner product
//! and norm used by the Lanczos estimator and the interleaved moment recursion. With the `rayon`
//! feature enabled, reductions over long vectors run on the global thread pool.

use crate::core::traits::Scalar;
use num_complex::Complex64;

/// Vectors shorter than this are reduced serially even with `rayon` enabled.
pub const PARALLEL_THRESHOLD: usize = 4096;

impl Scalar for f64 {
    #[inline]
    fn from_real(x: f64) -> Self {
        x
    }
    #[inline]
    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }
    #[inline]
    fn conj(self) -> Self {
        self
    }
    #[inline]
    fn real(self) -> f64 {
        self
    }
    #[inline]
    fn abs_sqr(self) -> f64 {
        self * self
    }
    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * factor
    }
    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
    #[inline]
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

impl Scalar for Complex64 {
    #[inline]
    fn from_real(x: f64) -> Self {
        Complex64::new(x, 0.0)
    }
    #[inline]
    fn from_parts(re: f64, im: f64) -> Self {
        Complex64::new(re, im)
    }
    #[inline]
    fn conj(self) -> Self {
        Complex64::conj(&self)
    }
    #[inline]
    fn real(self) -> f64 {
        self.re
    }
    #[inline]
    fn abs_sqr(self) -> f64 {
        self.norm_sqr()
    }
    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * factor
    }
    #[inline]
    fn to_complex(self) -> Complex64 {
        self
    }
    #[inline]
    fn is_finite(self) -> bool {
        Complex64::is_finite(self)
    }
}

/// Computes the inner product `<x|y> = Σ conj(x_k) y_k`.
pub fn dot<S: Scalar>(x: &[S], y: &[S]) -> S {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    #[cfg(feature = "rayon")]
    {
        if x.len() >= PARALLEL_THRESHOLD {
            use rayon::prelude::*;
            return x
                .par_iter()
                .zip(y.par_iter())
                .map(|(&xi, &yi)| xi.conj() * yi)
                .reduce(S::zero, |acc, v| acc + v);
        }
    }
    x.iter()
        .zip(y.iter())
        .fold(S::zero(), |acc, (&xi, &yi)| acc + xi.conj() * yi)
}

/// Computes the Euclidean norm `||x||_2`.
pub fn norm<S: Scalar>(x: &[S]) -> f64 {
    #[cfg(feature = "rayon")]
    {
        if x.len() >= PARALLEL_THRESHOLD {
            use rayon::prelude::*;
            return x.par_iter().map(|xi| xi.abs_sqr()).sum::<f64>().sqrt();
        }
    }
    x.iter().map(|xi| xi.abs_sqr()).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn complex_dot_conjugates_left_argument() {
        let x = vec![Complex64::new(0.0, 1.0), Complex64::new(2.0, 0.0)];
        let y = vec![Complex64::new(0.0, 1.0), Complex64::new(1.0, 1.0)];
        let d = dot(&x, &y);
        // conj(i)*i + 2*(1+i) = 1 + 2 + 2i
        assert_abs_diff_eq!(d.re, 3.0, epsilon = 1e-14);
        assert_abs_diff_eq!(d.im, 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(norm(&x), 5.0f64.sqrt(), epsilon = 1e-14);
    }

    #[test]
    fn long_real_reduction_matches_serial() {
        let n = 3 * PARALLEL_THRESHOLD + 7;
        let x: Vec<f64> = (0..n).map(|k| (k as f64 * 0.37).sin()).collect();
        let y: Vec<f64> = (0..n).map(|k| (k as f64 * 0.11).cos()).collect();
        let serial: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        assert_abs_diff_eq!(dot(&x, &y), serial, epsilon = 1e-9);
    }
}
