//! # Biomass Economic Dispatch
//!
//! A biomass plant runs at full load whenever the market price beats its
//! marginal cost. With an annual fuel budget the plant can only run a limited
//! number of hours, so the most profitable hours are picked first.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use super::{ensure_finite, Technology};
use crate::error::{Result, SimulationError};
use crate::series::{self, HourlySeries};

/// How much fuel the plant may burn in one year
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FuelBudget {
    /// Run every profitable hour
    #[default]
    Unlimited,
    /// At most `max_fuel_ton` tons per year; zero or less means no fuel at all
    AnnualLimit { max_fuel_ton: f64 },
}

impl FuelBudget {
    /// Annual limit in kg, `None` when unlimited
    pub fn limit_kg(&self) -> Option<f64> {
        match self {
            FuelBudget::Unlimited => None,
            FuelBudget::AnnualLimit { max_fuel_ton } => Some(max_fuel_ton * 1000.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BiomassParams {
    /// Thermal-to-electric efficiency
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub electrical_efficiency: f64,
    #[validate(range(min = 0.0))]
    pub fuel_cost_eur_ton: f64,
    /// Lower heating value of the fuel (kWh/kg)
    #[validate(range(exclusive_min = 0.0))]
    pub lhv_kwh_kg: f64,
    pub fuel_budget: FuelBudget,
    #[validate(range(min = 0.0, max = 1.0))]
    pub degradation_rate: f64,
}

impl Default for BiomassParams {
    fn default() -> Self {
        Self {
            electrical_efficiency: 0.25,
            fuel_cost_eur_ton: 150.0,
            lhv_kwh_kg: 4.5,
            fuel_budget: FuelBudget::Unlimited,
            degradation_rate: 0.005,
        }
    }
}

/// Totals of one dispatch run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub hours_dispatched: usize,
    pub energy_kwh: f64,
    pub fuel_burned_kg: f64,
    /// Revenue minus fuel cost over the dispatched hours
    pub gross_margin_eur: f64,
}

#[derive(Debug, Clone)]
pub struct BiomassOptimizer {
    params: BiomassParams,
}

impl BiomassOptimizer {
    pub fn new(params: BiomassParams) -> Result<Self> {
        params
            .validate()
            .map_err(|e| SimulationError::from_validation(Technology::Biomass, e))?;
        let budget = match params.fuel_budget {
            FuelBudget::AnnualLimit { max_fuel_ton } => max_fuel_ton,
            FuelBudget::Unlimited => 0.0,
        };
        ensure_finite(
            Technology::Biomass,
            &[
                ("electrical_efficiency", params.electrical_efficiency),
                ("fuel_cost_eur_ton", params.fuel_cost_eur_ton),
                ("lhv_kwh_kg", params.lhv_kwh_kg),
                ("fuel_budget.max_fuel_ton", budget),
                ("degradation_rate", params.degradation_rate),
            ],
        )?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BiomassParams {
        &self.params
    }

    /// Marginal generation cost (EUR/MWh electric)
    pub fn marginal_cost(&self) -> f64 {
        let fuel_cost_eur_kg = self.params.fuel_cost_eur_ton / 1000.0;
        let cost_per_mwh_thermal = fuel_cost_eur_kg / self.params.lhv_kwh_kg * 1000.0;
        cost_per_mwh_thermal / self.params.electrical_efficiency
    }

    /// Fuel burned in one hour at full load (kg)
    pub fn fuel_consumption_kg_per_hour(&self, capacity_kw: f64) -> f64 {
        capacity_kw.max(0.0) / self.params.electrical_efficiency / self.params.lhv_kwh_kg
    }

    /// Hourly dispatch (kW) against a price series (EUR/MWh).
    ///
    /// Every hour is either full capacity or zero. Equal-profit hours keep
    /// their chronological order when the fuel budget forces a choice.
    pub fn dispatch(&self, prices_eur_mwh: &[f64], capacity_kw: f64) -> HourlySeries {
        let mut dispatch = vec![0.0; prices_eur_mwh.len()];
        let capacity = series::sanitize_capacity(capacity_kw);
        if capacity == 0.0 {
            return dispatch;
        }

        let marginal = self.marginal_cost();
        let profitable = prices_eur_mwh
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite() && **p > marginal)
            .map(|(i, p)| (i, p - marginal));

        match self.params.fuel_budget.limit_kg() {
            None => {
                for (i, _) in profitable {
                    dispatch[i] = capacity;
                }
            }
            Some(limit) if limit <= 0.0 => {
                debug!("biomass: fuel budget is zero, plant stays off");
            }
            Some(limit) => {
                let max_hours = (limit / self.fuel_consumption_kg_per_hour(capacity)).floor() as usize;
                let mut ranked: Vec<(usize, f64)> = profitable.collect();
                // Stable sort keeps earlier hours first among equal profits
                ranked.sort_by_key(|(_, profit)| std::cmp::Reverse(OrderedFloat(*profit)));
                for (i, _) in ranked.into_iter().take(max_hours) {
                    dispatch[i] = capacity;
                }
            }
        }
        dispatch
    }

    pub fn summarize(&self, prices_eur_mwh: &[f64], dispatch_kw: &[f64]) -> DispatchSummary {
        let marginal = self.marginal_cost();
        let fuel_per_kwh = 1.0 / self.params.electrical_efficiency / self.params.lhv_kwh_kg;

        prices_eur_mwh
            .iter()
            .zip(dispatch_kw)
            .filter(|(_, kw)| **kw > 0.0)
            .fold(DispatchSummary::default(), |mut acc, (price, kw)| {
                acc.hours_dispatched += 1;
                acc.energy_kwh += kw;
                acc.fuel_burned_kg += kw * fuel_per_kwh;
                acc.gross_margin_eur += (price - marginal) * kw / 1000.0;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn limited(max_fuel_ton: f64) -> BiomassOptimizer {
        BiomassOptimizer::new(BiomassParams {
            fuel_budget: FuelBudget::AnnualLimit { max_fuel_ton },
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_marginal_cost_for_default_fuel() {
        let optimizer = BiomassOptimizer::new(BiomassParams::default()).unwrap();
        // 150 EUR/t, 4.5 kWh/kg, 25 % efficiency
        assert!((optimizer.marginal_cost() - 133.333_333).abs() < 1e-3);
    }

    #[test]
    fn test_unlimited_dispatch_is_merit_order() {
        let optimizer = BiomassOptimizer::new(BiomassParams::default()).unwrap();
        assert_eq!(optimizer.dispatch(&[10.0, 200.0], 500.0), vec![0.0, 500.0]);
    }

    #[test]
    fn test_zero_budget_means_off() {
        let optimizer = limited(0.0);
        assert_eq!(optimizer.dispatch(&[500.0, 600.0], 100.0), vec![0.0, 0.0]);
    }

    #[test]
    fn test_budget_picks_most_profitable_hours() {
        // 1000 kW burns 1000 / 0.25 / 4.5 ≈ 888.9 kg per hour, so 2 t covers 2 hours
        let optimizer = limited(2.0);
        let prices = [150.0, 300.0, 100.0, 250.0, 400.0];
        let dispatch = optimizer.dispatch(&prices, 1000.0);
        assert_eq!(dispatch, vec![0.0, 1000.0, 0.0, 0.0, 1000.0]);

        let summary = optimizer.summarize(&prices, &dispatch);
        assert_eq!(summary.hours_dispatched, 2);
        assert!(summary.fuel_burned_kg <= 2000.0);
        assert!((summary.energy_kwh - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_budget_never_runs_unprofitable_hours() {
        let optimizer = limited(1000.0);
        let dispatch = optimizer.dispatch(&[10.0, 140.0, 20.0], 100.0);
        assert_eq!(dispatch, vec![0.0, 100.0, 0.0]);
    }

    #[test]
    fn test_equal_profits_break_ties_by_hour() {
        let optimizer = limited(1.0);
        // 100 kW burns ~88.9 kg per hour: 11 hours fit into one ton
        let prices = vec![200.0; 20];
        let dispatch = optimizer.dispatch(&prices, 100.0);
        assert!(dispatch[..11].iter().all(|kw| *kw == 100.0));
        assert!(dispatch[11..].iter().all(|kw| *kw == 0.0));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-50.0)]
    #[case(f64::NAN)]
    fn test_degenerate_capacity_is_zero(#[case] capacity: f64) {
        let optimizer = BiomassOptimizer::new(BiomassParams::default()).unwrap();
        assert_eq!(optimizer.dispatch(&[500.0, 500.0], capacity), vec![0.0, 0.0]);
    }

    #[test]
    fn test_nan_prices_are_skipped() {
        let optimizer = BiomassOptimizer::new(BiomassParams::default()).unwrap();
        assert_eq!(optimizer.dispatch(&[f64::NAN, 300.0], 10.0), vec![0.0, 10.0]);
        assert!(optimizer.dispatch(&[], 10.0).is_empty());
    }

    #[rstest]
    #[case(BiomassParams { lhv_kwh_kg: 0.0, ..Default::default() })]
    #[case(BiomassParams { electrical_efficiency: 0.0, ..Default::default() })]
    #[case(BiomassParams { fuel_cost_eur_ton: -1.0, ..Default::default() })]
    #[case(BiomassParams { fuel_budget: FuelBudget::AnnualLimit { max_fuel_ton: f64::NAN }, ..Default::default() })]
    fn test_invalid_configuration(#[case] params: BiomassParams) {
        let err = BiomassOptimizer::new(params).unwrap_err();
        assert_eq!(err.technology(), Some(Technology::Biomass));
    }

    #[test]
    fn test_fuel_budget_deserializes_explicitly() {
        let budget: FuelBudget =
            serde_json::from_str(r#"{ "mode": "annual_limit", "max_fuel_ton": 120.0 }"#).unwrap();
        assert_eq!(budget.limit_kg(), Some(120_000.0));
        let budget: FuelBudget = serde_json::from_str(r#"{ "mode": "unlimited" }"#).unwrap();
        assert_eq!(budget, FuelBudget::Unlimited);
    }
}
