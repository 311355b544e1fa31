//! # Solar PV Generation
//!
//! Converts plane-of-array (or global horizontal) irradiance and ambient
//! temperature into AC power using a NOCT cell-temperature approximation,
//! a linear temperature derating and a fixed inverter cut-in threshold.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;
use validator::Validate;

use super::{ensure_finite, Technology};
use crate::error::{Result, SimulationError};
use crate::series::{self, HourlySeries};

/// Irradiance at standard test conditions (W/m²)
const G_STC: f64 = 1000.0;
/// Cell temperature at standard test conditions (°C)
const T_STC: f64 = 25.0;
/// Irradiance at which NOCT is specified (W/m²)
const G_NOCT: f64 = 800.0;
/// Ambient temperature at which NOCT is specified (°C)
const T_NOCT_AMBIENT: f64 = 20.0;
/// DC power below this fraction of capacity keeps the inverter idle
const INVERTER_CUT_IN_FRACTION: f64 = 0.01;
/// Peak sun hours reported when no irradiance data is available
pub const DEFAULT_PEAK_SUN_HOURS: f64 = 1500.0;

/// Module technology. Each carries a default temperature coefficient and
/// bifaciality that explicit parameters override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PanelType {
    #[default]
    Monocrystalline,
    Polycrystalline,
    #[serde(alias = "thin_film")]
    ThinFilm,
    Bifacial,
    Custom,
}

impl PanelType {
    /// Power temperature coefficient (fraction per °C)
    pub fn temp_coef(&self) -> f64 {
        match self {
            PanelType::Monocrystalline | PanelType::Bifacial | PanelType::Custom => -0.0035,
            PanelType::Polycrystalline => -0.0045,
            PanelType::ThinFilm => -0.0020,
        }
    }

    /// Rear-side to front-side efficiency ratio
    pub fn bifaciality(&self) -> f64 {
        match self {
            PanelType::Bifacial => 0.70,
            _ => 0.0,
        }
    }
}

/// Solar plant parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SolarParams {
    pub panel_type: PanelType,
    /// Wiring, soiling and mismatch losses (fraction)
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub system_loss: f64,
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub inverter_eff: f64,
    /// Overrides the panel type coefficient when set (fraction per °C)
    #[validate(range(min = -0.02, max = 0.0))]
    pub temp_coef: Option<f64>,
    /// Overrides the panel type bifaciality when set
    #[validate(range(min = 0.0, max = 1.0))]
    pub bifaciality: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub albedo: f64,
    /// Share of ground-reflected light reaching the rear side
    #[validate(range(min = 0.0, max = 1.0))]
    pub bifacial_rear_fraction: f64,
    /// Nominal operating cell temperature (°C)
    #[validate(range(min = 20.0, max = 80.0))]
    pub noct_c: f64,
    /// Annual output degradation (fraction per year)
    #[validate(range(min = 0.0, max = 1.0))]
    pub degradation_rate: f64,
}

impl Default for SolarParams {
    fn default() -> Self {
        Self {
            panel_type: PanelType::Monocrystalline,
            system_loss: 0.14,
            inverter_eff: 0.96,
            temp_coef: None,
            bifaciality: None,
            albedo: 0.2,
            bifacial_rear_fraction: 0.1,
            noct_c: 43.0,
            degradation_rate: 0.005,
        }
    }
}

/// PV plant model with parameters resolved and validated
#[derive(Debug, Clone)]
pub struct SolarModel {
    params: SolarParams,
    temp_coef: f64,
    bifacial_gain: f64,
}

impl SolarModel {
    pub fn new(params: SolarParams) -> Result<Self> {
        params
            .validate()
            .map_err(|e| SimulationError::from_validation(Technology::Solar, e))?;
        ensure_finite(
            Technology::Solar,
            &[
                ("system_loss", params.system_loss),
                ("inverter_eff", params.inverter_eff),
                ("albedo", params.albedo),
                ("bifacial_rear_fraction", params.bifacial_rear_fraction),
                ("noct_c", params.noct_c),
                ("degradation_rate", params.degradation_rate),
                ("temp_coef", params.temp_coef.unwrap_or(0.0)),
                ("bifaciality", params.bifaciality.unwrap_or(0.0)),
            ],
        )?;

        let temp_coef = params
            .temp_coef
            .unwrap_or_else(|| params.panel_type.temp_coef());
        let bifaciality = params
            .bifaciality
            .unwrap_or_else(|| params.panel_type.bifaciality());
        let bifacial_gain = if bifaciality > 0.0 {
            bifaciality * params.albedo * params.bifacial_rear_fraction
        } else {
            0.0
        };

        Ok(Self {
            params,
            temp_coef,
            bifacial_gain,
        })
    }

    pub fn params(&self) -> &SolarParams {
        &self.params
    }

    /// Effective temperature coefficient after applying the panel preset
    pub fn temp_coef(&self) -> f64 {
        self.temp_coef
    }

    /// Cell temperature from the NOCT approximation
    pub fn cell_temperature(&self, irradiance_w_m2: f64, ambient_c: f64) -> f64 {
        ambient_c + (self.params.noct_c - T_NOCT_AMBIENT) * (irradiance_w_m2 / G_NOCT)
    }

    /// AC output for a single hour
    pub fn ac_power_kw(&self, irradiance_w_m2: f64, ambient_c: f64, capacity_kw: f64) -> f64 {
        let g = if irradiance_w_m2.is_finite() { irradiance_w_m2 } else { 0.0 };
        let t_amb = if ambient_c.is_finite() { ambient_c } else { T_STC };
        let capacity_kw = series::sanitize_capacity(capacity_kw);

        let t_cell = self.cell_temperature(g, t_amb);
        let derating = 1.0 + self.temp_coef * (t_cell - T_STC);
        let dc_kw = capacity_kw * (g / G_STC) * derating * (1.0 + self.bifacial_gain);

        let cut_in_kw = INVERTER_CUT_IN_FRACTION * capacity_kw;
        if dc_kw > cut_in_kw {
            (dc_kw * (1.0 - self.params.system_loss) * self.params.inverter_eff).max(0.0)
        } else {
            0.0
        }
    }

    /// Hourly AC output (kW) for aligned irradiance and temperature series.
    ///
    /// Series of different length are truncated to the shorter one.
    pub fn generate(
        &self,
        irradiance_w_m2: &[f64],
        ambient_temp_c: &[f64],
        capacity_kw: f64,
    ) -> HourlySeries {
        let n = series::aligned_len(&[irradiance_w_m2, ambient_temp_c]);
        let invalid = series::count_invalid(&irradiance_w_m2[..n])
            + series::count_invalid(&ambient_temp_c[..n]);
        if invalid > 0 {
            debug!(invalid, "solar: absorbed non-finite weather samples");
        }

        irradiance_w_m2[..n]
            .iter()
            .zip(&ambient_temp_c[..n])
            .map(|(g, t)| self.ac_power_kw(*g, *t, capacity_kw))
            .collect()
    }
}

/// Annual insolation expressed as hours at 1000 W/m²
pub fn peak_sun_hours(ghi_w_m2: &[f64]) -> f64 {
    if ghi_w_m2.is_empty() {
        return DEFAULT_PEAK_SUN_HOURS;
    }
    let total: f64 = ghi_w_m2.iter().filter(|v| v.is_finite()).sum();
    total / G_STC
}
