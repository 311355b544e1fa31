//! Lifetime projection of a representative monthly profile.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::technology::Technology;

/// Geometric degradation of a twelve-month profile over the plant lifetime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongTermProjector {
    pub lifetime_years: u32,
    /// Fractional output loss per elapsed year
    pub degradation_rate: f64,
}

impl LongTermProjector {
    pub fn new(technology: Technology, lifetime_years: u32, degradation_rate: f64) -> Result<Self> {
        if !(degradation_rate.is_finite() && (0.0..=1.0).contains(&degradation_rate)) {
            return Err(SimulationError::invalid(
                technology,
                format!("degradation rate must lie in [0, 1], got {degradation_rate}"),
            ));
        }
        Ok(Self {
            lifetime_years,
            degradation_rate,
        })
    }

    /// Output factor in year `k` (0-based) relative to the first year
    pub fn factor(&self, year_index: u32) -> f64 {
        (1.0 - self.degradation_rate).powi(year_index as i32)
    }

    /// `lifetime_years × 12` monthly values; year `k` is the base profile
    /// scaled by `(1 - d)^k`.
    pub fn project(&self, monthly_profile: &[f64; 12]) -> Vec<f64> {
        (0..self.lifetime_years)
            .flat_map(|k| {
                let factor = self.factor(k);
                monthly_profile.iter().map(move |m| m * factor)
            })
            .collect()
    }

    /// Annual totals of a projection produced by [`project`](Self::project)
    pub fn annual_totals(projection: &[f64]) -> Vec<f64> {
        projection.chunks(12).map(|year| year.iter().sum()).collect()
    }
}
