//! # Technology Models
//!
//! One model per generation technology plus the battery arbitrage simulator.
//! Every model is built from a typed parameter record, validated once in
//! `new`, and afterwards maps already-materialised hourly series to hourly
//! power without touching shared state.
//!
//! - **Solar**: NOCT thermal derating, bifacial gain, inverter cut-in
//! - **Wind**: log-law hub extrapolation, generic or manufacturer power curve, air density
//! - **Hydro**: catchment runoff, rolling-mean river response, Manning head loss
//! - **Biomass**: merit-order dispatch under an optional annual fuel budget
//! - **Battery**: percentile-threshold price arbitrage

pub mod battery;
pub mod biomass;
pub mod hydro;
pub mod solar;
pub mod weibull;
pub mod wind;

pub use battery::{ArbitrageResult, BatteryParams, BatteryStorage};
pub use biomass::{BiomassOptimizer, BiomassParams, DispatchSummary, FuelBudget};
pub use hydro::{HydroModel, HydroParams, Penstock};
pub use solar::{PanelType, SolarModel, SolarParams};
pub use weibull::WeibullDistribution;
pub use wind::{PowerCurvePoint, WindModel, WindParams};

use figment::{providers::Serialized, Figment};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

use crate::error::{Result, SimulationError};

/// Technology tag carried by requests, results and errors
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Technology {
    Solar,
    Wind,
    Hydro,
    Biomass,
    Battery,
}

/// Parameters for one generation technology, tagged by technology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "technology", rename_all = "lowercase")]
pub enum TechnologyParams {
    Solar(SolarParams),
    Wind(WindParams),
    Hydro(HydroParams),
    Biomass(BiomassParams),
}

impl TechnologyParams {
    pub fn technology(&self) -> Technology {
        match self {
            TechnologyParams::Solar(_) => Technology::Solar,
            TechnologyParams::Wind(_) => Technology::Wind,
            TechnologyParams::Hydro(_) => Technology::Hydro,
            TechnologyParams::Biomass(_) => Technology::Biomass,
        }
    }

    /// Annual degradation used by the long-term projection
    pub fn degradation_rate(&self) -> f64 {
        match self {
            TechnologyParams::Solar(p) => p.degradation_rate,
            TechnologyParams::Wind(p) => p.degradation_rate,
            TechnologyParams::Hydro(p) => p.degradation_rate,
            TechnologyParams::Biomass(p) => p.degradation_rate,
        }
    }
}

/// Layer structured overrides (e.g. catalog entries or request fields) over
/// `defaults`, one top-level field at a time.
///
/// A scalar field whose value does not fit the target type is skipped with a
/// warning so the default stays in place. Structured fields (records, tagged
/// enums, lists) must deserialise completely or the whole layering fails.
/// `null` clears an optional field and leaves required ones at their default.
/// Unknown fields are ignored.
pub fn layer_overrides<T>(
    technology: Technology,
    defaults: &T,
    overrides: &serde_json::Value,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let Some(fields) = overrides.as_object() else {
        if !overrides.is_null() {
            warn!(%technology, "ignoring non-object parameter overrides");
        }
        return reserialize(technology, defaults);
    };

    let mut current = reserialize(technology, defaults)?;
    for (key, value) in fields {
        if value.is_null() {
            current = clear_field(technology, current, key)?;
            continue;
        }
        let mut single = serde_json::Map::new();
        single.insert(key.clone(), value.clone());

        let merged = Figment::from(Serialized::defaults(&current))
            .merge(Serialized::globals(serde_json::Value::Object(single)))
            .extract::<T>();
        match merged {
            Ok(next) => current = next,
            Err(e) if value.is_object() || value.is_array() => {
                return Err(SimulationError::invalid(technology, format!("{key}: {e}")))
            }
            Err(e) => warn!(%technology, field = %key, error = %e, "ignoring unusable parameter override"),
        }
    }
    Ok(current)
}

fn clear_field<T>(technology: Technology, current: T, key: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut record = serde_json::to_value(&current)
        .map_err(|e| SimulationError::invalid(technology, e.to_string()))?;
    let Some(fields) = record.as_object_mut() else {
        return Ok(current);
    };
    if !fields.contains_key(key) {
        return Ok(current);
    }
    fields.insert(key.to_string(), serde_json::Value::Null);
    match serde_json::from_value(record) {
        Ok(cleared) => Ok(cleared),
        Err(e) => {
            warn!(%technology, field = %key, error = %e, "required parameter cannot be cleared");
            Ok(current)
        }
    }
}

fn reserialize<T>(technology: Technology, value: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    Figment::from(Serialized::defaults(value))
        .extract::<T>()
        .map_err(|e| SimulationError::invalid(technology, e.to_string()))
}

/// Reject NaN and infinite parameters, which `validator` range rules let through
pub(crate) fn ensure_finite(technology: Technology, fields: &[(&str, f64)]) -> Result<()> {
    match fields.iter().find(|(_, v)| !v.is_finite()) {
        Some((name, v)) => Err(SimulationError::invalid(
            technology,
            format!("{name} must be a finite number, got {v}"),
        )),
        None => Ok(()),
    }
}
