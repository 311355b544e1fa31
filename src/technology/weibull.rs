//! Weibull wind-speed statistics.
//!
//! Used to estimate long-run mean turbine output from a speed distribution
//! instead of an hourly series. A shape factor of 2 is the Rayleigh case.

use serde::{Deserialize, Serialize};
use statrs::function::gamma::gamma;

use super::Technology;
use crate::error::{Result, SimulationError};

/// Shape factor of the Rayleigh distribution
pub const RAYLEIGH_SHAPE: f64 = 2.0;

/// Two-parameter Weibull distribution of wind speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeibullDistribution {
    /// Shape factor k (dimensionless)
    pub shape_k: f64,
    /// Scale factor c (m/s)
    pub scale_c: f64,
}

impl WeibullDistribution {
    pub fn new(shape_k: f64, scale_c: f64) -> Result<Self> {
        if !(shape_k.is_finite() && shape_k > 0.0) {
            return Err(SimulationError::invalid(
                Technology::Wind,
                format!("weibull shape must be positive, got {shape_k}"),
            ));
        }
        if !(scale_c.is_finite() && scale_c > 0.0) {
            return Err(SimulationError::invalid(
                Technology::Wind,
                format!("weibull scale must be positive, got {scale_c}"),
            ));
        }
        Ok(Self { shape_k, scale_c })
    }

    /// Distribution with the given shape whose mean equals `mean_speed_ms`
    pub fn from_mean_speed(mean_speed_ms: f64, shape_k: f64) -> Result<Self> {
        let scale_c = mean_speed_ms / gamma(1.0 + 1.0 / shape_k);
        Self::new(shape_k, scale_c)
    }

    pub fn rayleigh(mean_speed_ms: f64) -> Result<Self> {
        Self::from_mean_speed(mean_speed_ms, RAYLEIGH_SHAPE)
    }

    /// Method-of-moments fit (Justus): `k = (σ/μ)^-1.086`, `c = μ / Γ(1 + 1/k)`.
    ///
    /// Returns `None` for series without a usable spread (empty, calm, constant).
    pub fn fit(speeds_ms: &[f64]) -> Option<Self> {
        let valid: Vec<f64> = speeds_ms
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();
        if valid.len() < 2 {
            return None;
        }
        let n = valid.len() as f64;
        let mean = valid.iter().sum::<f64>() / n;
        let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if mean <= 0.0 || std_dev <= 0.0 {
            return None;
        }

        let shape_k = (std_dev / mean).powf(-1.086);
        Self::from_mean_speed(mean, shape_k).ok()
    }

    pub fn pdf(&self, speed_ms: f64) -> f64 {
        if speed_ms < 0.0 {
            return 0.0;
        }
        let (k, c) = (self.shape_k, self.scale_c);
        let x = speed_ms / c;
        let density = (k / c) * x.powf(k - 1.0) * (-x.powf(k)).exp();
        if density.is_finite() {
            density
        } else {
            0.0
        }
    }

    pub fn cdf(&self, speed_ms: f64) -> f64 {
        if speed_ms <= 0.0 {
            return 0.0;
        }
        1.0 - (-(speed_ms / self.scale_c).powf(self.shape_k)).exp()
    }

    pub fn mean(&self) -> f64 {
        self.scale_c * gamma(1.0 + 1.0 / self.shape_k)
    }

    /// Expected value of `f(v)` by trapezoid integration over `[0, upper_ms]`
    pub fn expectation<F>(&self, upper_ms: f64, step_ms: f64, f: F) -> f64
    where
        F: Fn(f64) -> f64,
    {
        if !(upper_ms > 0.0 && step_ms > 0.0) {
            return 0.0;
        }
        let steps = (upper_ms / step_ms).ceil() as usize;
        let mut total = 0.0;
        let mut prev = f(0.0) * self.pdf(0.0);
        for i in 1..=steps {
            let v = (i as f64 * step_ms).min(upper_ms);
            let v_prev = ((i - 1) as f64 * step_ms).min(upper_ms);
            let current = f(v) * self.pdf(v);
            total += 0.5 * (prev + current) * (v - v_prev);
            prev = current;
        }
        total
    }
}
