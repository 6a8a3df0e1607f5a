//! Result containers.

use crate::error::{KpmError, Result};

/// Local density of states on an energy grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Ldos {
    energy: Vec<f64>,
    values: Vec<f64>,
}

impl Ldos {
    pub fn new(energy: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if energy.len() != values.len() {
            return Err(KpmError::InvalidConfig(format!(
                "{} energies but {} values",
                energy.len(),
                values.len()
            )));
        }
        Ok(Self { energy, values })
    }

    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Trapezoid integral over the energy grid.
    pub fn integrate(&self) -> f64 {
        self.energy
            .windows(2)
            .zip(self.values.windows(2))
            .map(|(e, v)| 0.5 * (e[1] - e[0]) * (v[0] + v[1]))
            .sum()
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.energy, self.values)
    }
}
