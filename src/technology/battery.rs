//! # Battery Price Arbitrage
//!
//! Charges in cheap hours and discharges in expensive ones. The thresholds are
//! percentiles of the price series itself, recomputed for every call. The
//! simulation walks the hours in order since each state of charge depends on
//! the previous one.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ensure_finite, Technology};
use crate::error::{Result, SimulationError};
use crate::series::{self, HourlySeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BatteryParams {
    #[validate(range(min = 0.0))]
    pub energy_capacity_kwh: f64,
    #[validate(range(min = 0.0))]
    pub max_power_kw: f64,
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub round_trip_efficiency: f64,
    /// Charge when the price is at or below this percentile
    #[validate(range(min = 0.0, max = 100.0))]
    pub charge_percentile: f64,
    /// Discharge when the price is at or above this percentile
    #[validate(range(min = 0.0, max = 100.0))]
    pub discharge_percentile: f64,
}

impl Default for BatteryParams {
    fn default() -> Self {
        Self {
            energy_capacity_kwh: 100.0,
            max_power_kw: 50.0,
            round_trip_efficiency: 0.9,
            charge_percentile: 40.0,
            discharge_percentile: 90.0,
        }
    }
}

/// Output of one arbitrage pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArbitrageResult {
    /// Signed grid exchange: negative while charging, positive while discharging
    pub dispatch_kw: HourlySeries,
    /// Stored energy at the end of each hour
    pub state_of_charge_kwh: HourlySeries,
}

impl ArbitrageResult {
    /// Energy delivered minus energy absorbed, priced hour by hour (EUR)
    pub fn revenue_eur(&self, prices_eur_mwh: &[f64]) -> f64 {
        self.dispatch_kw
            .iter()
            .zip(prices_eur_mwh)
            .filter(|(_, p)| p.is_finite())
            .map(|(kw, p)| kw * p / 1000.0)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct BatteryStorage {
    params: BatteryParams,
}

impl BatteryStorage {
    pub fn new(params: BatteryParams) -> Result<Self> {
        params
            .validate()
            .map_err(|e| SimulationError::from_validation(Technology::Battery, e))?;
        ensure_finite(
            Technology::Battery,
            &[
                ("energy_capacity_kwh", params.energy_capacity_kwh),
                ("max_power_kw", params.max_power_kw),
                ("round_trip_efficiency", params.round_trip_efficiency),
            ],
        )?;
        if params.charge_percentile >= params.discharge_percentile {
            return Err(SimulationError::invalid(
                Technology::Battery,
                format!(
                    "charge percentile ({}) must be below discharge percentile ({})",
                    params.charge_percentile, params.discharge_percentile
                ),
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &BatteryParams {
        &self.params
    }

    fn one_way_efficiency(&self) -> f64 {
        self.params.round_trip_efficiency.sqrt()
    }

    /// Simulate one arbitrage pass starting from an empty battery.
    ///
    /// Non-finite prices are idle hours. An empty or all-invalid series yields
    /// an idle result of the same length.
    pub fn arbitrage(&self, prices_eur_mwh: &[f64]) -> ArbitrageResult {
        let n = prices_eur_mwh.len();
        let thresholds = series::percentile(prices_eur_mwh, self.params.charge_percentile)
            .zip(series::percentile(prices_eur_mwh, self.params.discharge_percentile));
        let Some((charge_below, discharge_above)) = thresholds else {
            return ArbitrageResult {
                dispatch_kw: vec![0.0; n],
                state_of_charge_kwh: vec![0.0; n],
            };
        };

        let capacity = self.params.energy_capacity_kwh;
        let max_power = self.params.max_power_kw;
        let eta = self.one_way_efficiency();

        let mut soc = 0.0_f64;
        let mut result = ArbitrageResult {
            dispatch_kw: Vec::with_capacity(n),
            state_of_charge_kwh: Vec::with_capacity(n),
        };

        for price in prices_eur_mwh {
            let mut exchange = 0.0;
            if price.is_finite() && *price <= charge_below {
                let charge = max_power.min(capacity - soc).max(0.0);
                soc += charge * eta;
                exchange = -charge;
            } else if price.is_finite() && *price >= discharge_above {
                let discharge = max_power.min(soc * eta);
                soc -= discharge / eta;
                exchange = discharge;
            }
            soc = soc.clamp(0.0, capacity);
            result.dispatch_kw.push(exchange);
            result.state_of_charge_kwh.push(soc);
        }
        result
    }
}
