//! # Wind Generation
//!
//! Extrapolates 10 m wind speed to hub height with the logarithmic wind
//! profile, converts it to power with either a manufacturer curve (treated as
//! a normalised shape) or a generic three-region curve, and optionally
//! corrects for site air density.

use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use super::{ensure_finite, Technology, WeibullDistribution};
use crate::error::{Result, SimulationError};
use crate::series::{self, HourlySeries};

/// Specific gas constant of dry air (J/kg·K)
const R_SPECIFIC_AIR: f64 = 287.058;
/// Standard air density the power curves refer to (kg/m³)
const RHO_STD: f64 = 1.225;
/// Fallback temperature for missing samples (°C)
const DEFAULT_TEMPERATURE_C: f64 = 15.0;
/// Fallback surface pressure for missing samples (hPa)
const DEFAULT_PRESSURE_HPA: f64 = 1013.25;
/// Integration step for distribution-based estimates (m/s)
const DISTRIBUTION_STEP_MS: f64 = 0.5;
/// Integration range beyond cut-out for distribution-based estimates (m/s)
const DISTRIBUTION_MARGIN_MS: f64 = 5.0;

/// One point of a manufacturer power curve, serialised as `[speed, power]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct PowerCurvePoint {
    pub speed_ms: f64,
    pub power_kw: f64,
}

impl From<(f64, f64)> for PowerCurvePoint {
    fn from((speed_ms, power_kw): (f64, f64)) -> Self {
        Self { speed_ms, power_kw }
    }
}

impl From<PowerCurvePoint> for (f64, f64) {
    fn from(p: PowerCurvePoint) -> Self {
        (p.speed_ms, p.power_kw)
    }
}

/// Wind farm parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WindParams {
    #[validate(range(exclusive_min = 0.0))]
    pub hub_height_m: f64,
    /// Surface roughness length z0
    #[validate(range(exclusive_min = 0.0))]
    pub roughness_length_m: f64,
    /// Measurement height of the input wind speed
    #[validate(range(exclusive_min = 0.0))]
    pub reference_height_m: f64,
    #[validate(range(min = 0.0))]
    pub cut_in_ms: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub rated_ms: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub cut_out_ms: f64,
    /// Manufacturer curve; replaces the generic curve when present
    pub power_curve: Option<Vec<PowerCurvePoint>>,
    /// Wake, electrical and availability losses applied to the final output
    #[validate(range(min = 0.0, max = 1.0))]
    pub availability_factor: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub degradation_rate: f64,
}

impl Default for WindParams {
    fn default() -> Self {
        Self {
            hub_height_m: 80.0,
            roughness_length_m: 0.03,
            reference_height_m: 10.0,
            cut_in_ms: 3.0,
            rated_ms: 12.0,
            cut_out_ms: 25.0,
            power_curve: None,
            availability_factor: 1.0,
            degradation_rate: 0.01,
        }
    }
}

/// Wind plant model with the log-law shear factor precomputed
#[derive(Debug, Clone)]
pub struct WindModel {
    params: WindParams,
    shear_factor: f64,
    curve: Option<Vec<PowerCurvePoint>>,
}

impl WindModel {
    pub fn new(params: WindParams) -> Result<Self> {
        params
            .validate()
            .map_err(|e| SimulationError::from_validation(Technology::Wind, e))?;
        ensure_finite(
            Technology::Wind,
            &[
                ("hub_height_m", params.hub_height_m),
                ("roughness_length_m", params.roughness_length_m),
                ("reference_height_m", params.reference_height_m),
                ("cut_in_ms", params.cut_in_ms),
                ("rated_ms", params.rated_ms),
                ("cut_out_ms", params.cut_out_ms),
                ("availability_factor", params.availability_factor),
                ("degradation_rate", params.degradation_rate),
            ],
        )?;

        let z0 = params.roughness_length_m;
        if z0 >= params.reference_height_m || z0 >= params.hub_height_m {
            return Err(SimulationError::invalid(
                Technology::Wind,
                format!(
                    "roughness length {z0} m must be below both the reference height ({} m) and hub height ({} m)",
                    params.reference_height_m, params.hub_height_m
                ),
            ));
        }
        if !(params.cut_in_ms < params.rated_ms && params.rated_ms < params.cut_out_ms) {
            return Err(SimulationError::invalid(
                Technology::Wind,
                format!(
                    "expected cut-in < rated < cut-out, got {} / {} / {} m/s",
                    params.cut_in_ms, params.rated_ms, params.cut_out_ms
                ),
            ));
        }

        let curve = match &params.power_curve {
            Some(points) => Some(Self::prepare_curve(points)?),
            None => None,
        };
        let shear_factor = (params.hub_height_m / z0).ln() / (params.reference_height_m / z0).ln();

        Ok(Self {
            params,
            shear_factor,
            curve,
        })
    }

    fn prepare_curve(points: &[PowerCurvePoint]) -> Result<Vec<PowerCurvePoint>> {
        if points.is_empty() {
            return Err(SimulationError::invalid(
                Technology::Wind,
                "power curve must contain at least one point",
            ));
        }
        if let Some(p) = points.iter().find(|p| {
            !(p.speed_ms.is_finite() && p.power_kw.is_finite())
                || p.speed_ms < 0.0
                || p.power_kw < 0.0
        }) {
            return Err(SimulationError::invalid(
                Technology::Wind,
                format!(
                    "power curve point ({}, {}) must be finite and non-negative",
                    p.speed_ms, p.power_kw
                ),
            ));
        }
        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.speed_ms.total_cmp(&b.speed_ms));
        Ok(sorted)
    }

    pub fn params(&self) -> &WindParams {
        &self.params
    }

    /// Ratio `ln(z_hub/z0) / ln(z_ref/z0)`
    pub fn shear_factor(&self) -> f64 {
        self.shear_factor
    }

    /// Hub-height speed for a reference-height sample; missing or negative samples are calm
    pub fn hub_speed(&self, speed_ref_ms: f64) -> f64 {
        if speed_ref_ms.is_finite() && speed_ref_ms > 0.0 {
            speed_ref_ms * self.shear_factor
        } else {
            0.0
        }
    }

    /// Generic three-region curve: cubic ramp between cut-in and rated, flat to cut-out
    pub fn generic_power_kw(&self, hub_speed_ms: f64, capacity_kw: f64) -> f64 {
        let p = &self.params;
        if hub_speed_ms < p.cut_in_ms || hub_speed_ms >= p.cut_out_ms {
            0.0
        } else if hub_speed_ms >= p.rated_ms {
            capacity_kw
        } else {
            capacity_kw * ((hub_speed_ms - p.cut_in_ms) / (p.rated_ms - p.cut_in_ms)).powi(3)
        }
    }

    /// Manufacturer curve interpolated at `hub_speed_ms` and rescaled so its
    /// maximum maps to `capacity_kw`. Zero outside the curve's speed range.
    fn curve_power_kw(curve: &[PowerCurvePoint], hub_speed_ms: f64, capacity_kw: f64) -> f64 {
        let curve_max = curve.iter().map(|p| p.power_kw).fold(0.0, f64::max);
        if curve_max <= 0.0 {
            return 0.0;
        }
        let raw = interpolate(curve, hub_speed_ms);
        raw / curve_max * capacity_kw
    }

    /// Power before density correction and availability losses
    pub fn base_power_kw(&self, hub_speed_ms: f64, capacity_kw: f64) -> f64 {
        match &self.curve {
            Some(curve) => Self::curve_power_kw(curve, hub_speed_ms, capacity_kw),
            None => self.generic_power_kw(hub_speed_ms, capacity_kw),
        }
    }

    /// Hourly output (kW) from 10 m wind speed.
    ///
    /// Density correction is applied only when both temperature and pressure
    /// are supplied; all three series are then truncated to the shortest.
    pub fn generate(
        &self,
        wind_speed_ref_ms: &[f64],
        capacity_kw: f64,
        temperature_c: Option<&[f64]>,
        pressure_hpa: Option<&[f64]>,
    ) -> HourlySeries {
        let capacity_kw = series::sanitize_capacity(capacity_kw);
        let density = match (temperature_c, pressure_hpa) {
            (Some(t), Some(p)) => Some((t, p)),
            _ => None,
        };
        let n = match density {
            Some((t, p)) => series::aligned_len(&[wind_speed_ref_ms, t, p]),
            None => wind_speed_ref_ms.len(),
        };
        if series::count_invalid(&wind_speed_ref_ms[..n]) > 0 {
            debug!("wind: treating non-finite speed samples as calm");
        }

        (0..n)
            .map(|i| {
                let v_hub = self.hub_speed(wind_speed_ref_ms[i]);
                let mut power = self.base_power_kw(v_hub, capacity_kw);
                if let Some((t, p)) = density {
                    let ratio = air_density(t[i], p[i]) / RHO_STD;
                    power = (power * ratio).min(capacity_kw);
                }
                power * self.params.availability_factor
            })
            .collect()
    }

    /// Long-run mean output for a hub-height speed distribution, at standard density
    pub fn expected_power_kw(&self, hub_distribution: &WeibullDistribution, capacity_kw: f64) -> f64 {
        let capacity_kw = series::sanitize_capacity(capacity_kw);
        let upper = match &self.curve {
            Some(curve) => curve.last().map(|p| p.speed_ms).unwrap_or(0.0),
            None => self.params.cut_out_ms,
        } + DISTRIBUTION_MARGIN_MS;

        hub_distribution.expectation(upper, DISTRIBUTION_STEP_MS, |v| {
            self.base_power_kw(v, capacity_kw)
        }) * self.params.availability_factor
    }
}

/// Air density from temperature and pressure via the ideal-gas law.
///
/// Missing or non-physical samples fall back to 15 °C and 1013.25 hPa.
pub fn air_density(temperature_c: f64, pressure_hpa: f64) -> f64 {
    let t = if temperature_c.is_finite() && temperature_c > -273.15 {
        temperature_c
    } else {
        DEFAULT_TEMPERATURE_C
    };
    let p = if pressure_hpa.is_finite() && pressure_hpa >= 0.0 {
        pressure_hpa
    } else {
        DEFAULT_PRESSURE_HPA
    };
    (p * 100.0) / (R_SPECIFIC_AIR * (t + 273.15))
}

/// Linear interpolation on a speed-sorted curve, zero outside its domain
fn interpolate(curve: &[PowerCurvePoint], speed_ms: f64) -> f64 {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    if speed_ms < first.speed_ms || speed_ms > last.speed_ms {
        return 0.0;
    }
    let idx = curve.partition_point(|p| p.speed_ms <= speed_ms);
    if idx == 0 {
        return first.power_kw;
    }
    let lo = curve[idx - 1];
    if idx == curve.len() || lo.speed_ms == speed_ms {
        return lo.power_kw;
    }
    let hi = curve[idx];
    let span = hi.speed_ms - lo.speed_ms;
    if span <= 0.0 {
        return lo.power_kw;
    }
    lo.power_kw + (hi.power_kw - lo.power_kw) * (speed_ms - lo.speed_ms) / span
}
