//! # Run-of-River Hydro Generation
//!
//! Precipitation over the catchment is turned into a runoff flow, smoothed by
//! a trailing rolling mean that stands in for the catchment's concentration
//! time, optionally rescaled to a design flow, and converted to power through
//! the hydraulic equation `P = ρ·g·Q·H·η`. When penstock geometry is known the
//! friction loss from the Manning formula is subtracted from the gross head.

use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;
use validator::Validate;

use super::{ensure_finite, Technology};
use crate::error::{Result, SimulationError};
use crate::series::{self, HourlySeries};

const WATER_DENSITY: f64 = 1000.0; // kg/m³
const GRAVITY: f64 = 9.81; // m/s²
const SECONDS_PER_HOUR: f64 = 3600.0;
/// Reference flows at or below this are treated as "no precipitation signal"
const MIN_REFERENCE_FLOW_M3S: f64 = 1e-6;
/// Mean of the synthetic seasonal flow, as a fraction of design flow
const SYNTHETIC_FLOW_BASE: f64 = 0.9;
/// Seasonal swing of the synthetic flow, as a fraction of design flow
const SYNTHETIC_FLOW_AMPLITUDE: f64 = 0.3;
/// Upper bound of the synthetic flow before the turbine cap, as a fraction of design flow
const SYNTHETIC_FLOW_CEILING: f64 = 1.5;

/// Penstock geometry for friction head loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Penstock {
    #[validate(range(min = 0.0))]
    pub length_m: f64,
    /// Inner diameter; zero disables the loss calculation
    #[validate(range(min = 0.0))]
    pub diameter_m: f64,
    /// Manning roughness coefficient
    #[validate(range(exclusive_min = 0.0))]
    pub manning_n: f64,
    /// Resize the pipe when the design flow would exceed this velocity
    #[validate(range(exclusive_min = 0.0))]
    pub max_velocity_ms: Option<f64>,
    /// Velocity the resized pipe is dimensioned for
    #[validate(range(exclusive_min = 0.0))]
    pub target_velocity_ms: f64,
}

impl Default for Penstock {
    fn default() -> Self {
        Self {
            length_m: 0.0,
            diameter_m: 0.0,
            manning_n: 0.013,
            max_velocity_ms: None,
            target_velocity_ms: 2.5,
        }
    }
}

impl Penstock {
    /// Diameter actually used, after optional auto-sizing for `design_flow_m3s`
    pub fn effective_diameter(&self, design_flow_m3s: Option<f64>) -> f64 {
        let (Some(limit), Some(q)) = (self.max_velocity_ms, design_flow_m3s) else {
            return self.diameter_m;
        };
        let area = PI * self.diameter_m.powi(2) / 4.0;
        if area > 0.0 && q / area > limit {
            (4.0 * q / (PI * self.target_velocity_ms)).sqrt()
        } else {
            self.diameter_m
        }
    }
}

/// Hydro plant and catchment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HydroParams {
    /// Gross head (m)
    #[validate(range(min = 0.0))]
    pub head_height_m: f64,
    /// Turbine-generator efficiency
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub efficiency: f64,
    #[validate(range(min = 0.0))]
    pub catchment_area_km2: f64,
    /// Fraction of precipitation that reaches the river
    #[validate(range(min = 0.0, max = 1.0))]
    pub runoff_coefficient: f64,
    /// Turbine design flow (m³/s); rescales and caps the flow series when set
    #[validate(range(exclusive_min = 0.0))]
    pub design_flow_m3s: Option<f64>,
    /// Reserved flow left in the river (m³/s)
    #[validate(range(min = 0.0))]
    pub ecological_flow_m3s: f64,
    /// Catchment response time used by the rolling mean (hours)
    #[validate(range(min = 1))]
    pub rolling_window_hours: usize,
    /// Flow percentile mapped onto the design flow
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub design_flow_percentile: f64,
    /// Standard deviation of the synthetic-flow noise, as a fraction of design flow
    #[validate(range(min = 0.0, max = 1.0))]
    pub synthetic_flow_noise: f64,
    pub synthetic_flow_seed: u64,
    #[validate(nested)]
    pub penstock: Option<Penstock>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub degradation_rate: f64,
}

impl Default for HydroParams {
    fn default() -> Self {
        Self {
            head_height_m: 10.0,
            efficiency: 0.90,
            catchment_area_km2: 10.0,
            runoff_coefficient: 0.5,
            design_flow_m3s: None,
            ecological_flow_m3s: 0.0,
            rolling_window_hours: 120,
            design_flow_percentile: 60.0,
            synthetic_flow_noise: 0.02,
            synthetic_flow_seed: 42,
            penstock: None,
            degradation_rate: 0.002,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HydroModel {
    params: HydroParams,
    noise: Normal<f64>,
}

impl HydroModel {
    pub fn new(params: HydroParams) -> Result<Self> {
        params
            .validate()
            .map_err(|e| SimulationError::from_validation(Technology::Hydro, e))?;
        let mut fields = vec![
            ("head_height_m", params.head_height_m),
            ("efficiency", params.efficiency),
            ("catchment_area_km2", params.catchment_area_km2),
            ("runoff_coefficient", params.runoff_coefficient),
            ("design_flow_m3s", params.design_flow_m3s.unwrap_or(1.0)),
            ("ecological_flow_m3s", params.ecological_flow_m3s),
            ("design_flow_percentile", params.design_flow_percentile),
            ("synthetic_flow_noise", params.synthetic_flow_noise),
            ("degradation_rate", params.degradation_rate),
        ];
        if let Some(p) = &params.penstock {
            fields.extend([
                ("penstock.length_m", p.length_m),
                ("penstock.diameter_m", p.diameter_m),
                ("penstock.manning_n", p.manning_n),
                ("penstock.target_velocity_ms", p.target_velocity_ms),
            ]);
        }
        ensure_finite(Technology::Hydro, &fields)?;

        let noise = Normal::new(0.0, params.synthetic_flow_noise)
            .map_err(|e| SimulationError::invalid(Technology::Hydro, e.to_string()))?;
        Ok(Self { params, noise })
    }

    pub fn params(&self) -> &HydroParams {
        &self.params
    }

    /// Power at design flow and gross head, the ceiling of any hourly output
    pub fn rated_power_kw(&self) -> Option<f64> {
        self.params
            .design_flow_m3s
            .map(|q| self.power_kw(q, self.params.head_height_m))
    }

    fn power_kw(&self, flow_m3s: f64, head_m: f64) -> f64 {
        WATER_DENSITY * GRAVITY * flow_m3s * head_m * self.params.efficiency / 1000.0
    }

    /// Raw catchment runoff (m³/s) after the rolling-mean river response
    pub fn runoff_flow(&self, precipitation_mm_per_hour: &[f64]) -> HourlySeries {
        let precip_m: Vec<f64> = precipitation_mm_per_hour
            .iter()
            .map(|p| if p.is_finite() { p.max(0.0) / 1000.0 } else { 0.0 })
            .collect();
        let smoothed = series::rolling_mean(&precip_m, self.params.rolling_window_hours);
        let area_m2 = self.params.catchment_area_km2 * 1_000_000.0;

        smoothed
            .into_iter()
            .map(|p| p * area_m2 * self.params.runoff_coefficient / SECONDS_PER_HOUR)
            .collect()
    }

    /// Turbine flow (m³/s): runoff rescaled to the design flow when one is
    /// configured, capped at the intake limit, minus the ecological flow.
    pub fn turbine_flow(&self, precipitation_mm_per_hour: &[f64]) -> HourlySeries {
        let mut flow = self.runoff_flow(precipitation_mm_per_hour);

        if let Some(design) = self.params.design_flow_m3s {
            let reference = series::percentile(&flow, self.params.design_flow_percentile)
                .unwrap_or(0.0);
            if reference > MIN_REFERENCE_FLOW_M3S {
                let scale = design / reference;
                flow.iter_mut().for_each(|q| *q *= scale);
            } else {
                debug!(
                    hours = flow.len(),
                    "hydro: no usable precipitation signal, using synthetic seasonal flow"
                );
                flow = self.synthetic_flow(design, flow.len());
            }
            flow.iter_mut().for_each(|q| *q = q.min(design));
        }

        let reserved = self.params.ecological_flow_m3s;
        flow.iter_mut().for_each(|q| *q = (*q - reserved).max(0.0));
        flow
    }

    /// One seasonal cycle around the design flow spread over `hours`, bounded
    /// to `[0, 1.5 × design]`. Seeded, so repeated calls agree.
    pub fn synthetic_flow(&self, design_flow_m3s: f64, hours: usize) -> HourlySeries {
        let mut rng = StdRng::seed_from_u64(self.params.synthetic_flow_seed);
        series::linspace(0.0, 2.0 * PI, hours)
            .into_iter()
            .map(|t| {
                let seasonal = SYNTHETIC_FLOW_BASE + SYNTHETIC_FLOW_AMPLITUDE * (t - PI / 2.0).sin();
                let q = design_flow_m3s * (seasonal + self.noise.sample(&mut rng));
                q.clamp(0.0, design_flow_m3s * SYNTHETIC_FLOW_CEILING)
            })
            .collect()
    }

    /// Net head after penstock friction loss, floored at zero
    pub fn effective_head(&self, flow_m3s: f64) -> f64 {
        let gross = self.params.head_height_m;
        let Some(penstock) = &self.params.penstock else {
            return gross;
        };
        if penstock.length_m <= 0.0 || penstock.diameter_m <= 0.0 {
            return gross;
        }

        let diameter = penstock.effective_diameter(self.params.design_flow_m3s);
        let area = PI * diameter.powi(2) / 4.0;
        let hydraulic_radius = diameter / 4.0;
        if hydraulic_radius <= 0.0 {
            return gross;
        }
        let velocity = if area > 0.0 { flow_m3s / area } else { 0.0 };
        let slope = (velocity * penstock.manning_n).powi(2) / hydraulic_radius.powf(4.0 / 3.0);
        (gross - penstock.length_m * slope).max(0.0)
    }

    /// Hourly output (kW) from precipitation (mm/h)
    pub fn generate(&self, precipitation_mm_per_hour: &[f64]) -> HourlySeries {
        self.turbine_flow(precipitation_mm_per_hour)
            .into_iter()
            .map(|q| self.power_kw(q, self.effective_head(q)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_design(design: f64) -> HydroParams {
        HydroParams {
            design_flow_m3s: Some(design),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_precipitation_without_design_flow_is_zero() {
        let model = HydroModel::new(HydroParams::default()).unwrap();
        let out = model.generate(&vec![0.0; 500]);
        assert_eq!(out.len(), 500);
        assert!(out.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_runoff_and_power_without_design_flow() {
        let model = HydroModel::new(HydroParams {
            rolling_window_hours: 1,
            ..Default::default()
        })
        .unwrap();
        // 3.6 mm over 10 km² at 0.5 runoff in one hour: 5 m³/s
        let flow = model.runoff_flow(&[3.6]);
        assert!((flow[0] - 5.0).abs() < 1e-9);
        let out = model.generate(&[3.6]);
        let expected = 1000.0 * 9.81 * 5.0 * 10.0 * 0.9 / 1000.0;
        assert!((out[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_rolling_window_spreads_a_storm() {
        let model = HydroModel::new(HydroParams {
            rolling_window_hours: 4,
            ..Default::default()
        })
        .unwrap();
        let mut precip = vec![0.0; 8];
        precip[0] = 4.0;
        let flow = model.runoff_flow(&precip);
        assert!(flow[0] > flow[1]);
        assert!(flow[3] > 0.0);
        assert_eq!(flow[4], 0.0);
    }

    #[test]
    fn test_design_flow_rescales_and_caps() {
        let model = HydroModel::new(HydroParams {
            rolling_window_hours: 1,
            ..params_with_design(2.0)
        })
        .unwrap();
        let precip: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let flow = model.turbine_flow(&precip);
        assert!(flow.iter().all(|q| *q <= 2.0 + 1e-12));
        // The 60th percentile hour and everything above sit at the design flow
        assert!((flow[99] - 2.0).abs() < 1e-12);
        assert!(flow[10] < 2.0);

        let ceiling = model.rated_power_kw().unwrap();
        assert!(model.generate(&precip).iter().all(|p| *p <= ceiling + 1e-9));
    }

    #[test]
    fn test_synthetic_fallback_when_dry() {
        let model = HydroModel::new(params_with_design(3.0)).unwrap();
        let flow = model.turbine_flow(&vec![0.0; 8760]);
        assert!(flow.iter().all(|q| (0.0..=3.0).contains(q)));
        let mean = flow.iter().sum::<f64>() / flow.len() as f64;
        assert!(mean > 1.5, "mean synthetic flow {mean}");
        // Lowest at the start of the cycle, highest in the middle
        assert!(flow[0] < flow[4380]);

        // Seeded: identical across calls
        assert_eq!(flow, model.turbine_flow(&vec![0.0; 8760]));
    }

    #[test]
    fn test_ecological_flow_is_reserved() {
        let model = HydroModel::new(HydroParams {
            rolling_window_hours: 1,
            ecological_flow_m3s: 4.0,
            ..Default::default()
        })
        .unwrap();
        let flow = model.turbine_flow(&[3.6, 1.8]);
        assert!((flow[0] - 1.0).abs() < 1e-9);
        assert_eq!(flow[1], 0.0);
    }

    #[test]
    fn test_manning_head_loss() {
        let model = HydroModel::new(HydroParams {
            head_height_m: 50.0,
            penstock: Some(Penstock {
                length_m: 500.0,
                diameter_m: 1.0,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();
        let area = PI / 4.0;
        let v = 2.0 / area;
        let slope = (v * 0.013f64).powi(2) / 0.25f64.powf(4.0 / 3.0);
        assert!((model.effective_head(2.0) - (50.0 - 500.0 * slope)).abs() < 1e-9);
        assert_eq!(model.effective_head(0.0), 50.0);
        // Absurd flow drives the loss past the gross head
        assert_eq!(model.effective_head(500.0), 0.0);
    }

    #[test]
    fn test_zero_diameter_means_no_loss() {
        let model = HydroModel::new(HydroParams {
            penstock: Some(Penstock {
                length_m: 500.0,
                diameter_m: 0.0,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(model.effective_head(3.0), 10.0);
    }

    #[test]
    fn test_penstock_auto_sizing() {
        let penstock = Penstock {
            length_m: 100.0,
            diameter_m: 0.5,
            max_velocity_ms: Some(3.0),
            ..Default::default()
        };
        // 2 m³/s through 0.5 m is ~10 m/s, so the pipe is resized for 2.5 m/s
        let d = penstock.effective_diameter(Some(2.0));
        assert!((d - (4.0 * 2.0 / (PI * 2.5)).sqrt()).abs() < 1e-12);
        assert_eq!(penstock.effective_diameter(None), 0.5);
        assert_eq!(penstock.effective_diameter(Some(0.1)), 0.5);
    }

    #[test]
    fn test_nan_and_negative_precipitation_are_dry() {
        let model = HydroModel::new(HydroParams::default()).unwrap();
        let out = model.generate(&[f64::NAN, -3.0, f64::INFINITY]);
        assert!(out.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(HydroModel::new(HydroParams {
            head_height_m: -1.0,
            ..Default::default()
        })
        .is_err());
        assert!(HydroModel::new(HydroParams {
            design_flow_m3s: Some(0.0),
            ..Default::default()
        })
        .is_err());
        assert!(HydroModel::new(HydroParams {
            rolling_window_hours: 0,
            ..Default::default()
        })
        .is_err());
        let err = HydroModel::new(HydroParams {
            penstock: Some(Penstock {
                manning_n: 0.0,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.technology(), Some(Technology::Hydro));
    }
}
